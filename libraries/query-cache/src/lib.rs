//! A small reactive state engine for single-threaded UIs.
//! It was written for the course planner frontend, so it only covers what that app needs.
//!
//! Model:
//! 1. Query results live in a [`QueryCache`](data_model::QueryCache), keyed by whatever the app uses to name its queries.
//!    Each entry is a [`QueryState`](data_model::QueryState): loading, failed, or ready with data.
//! 2. Every write goes through a [`DirtyTracker`](data_model::DirtyTracker), which remembers that something changed and who changed it.
//! 3. Nothing is notified while state is being mutated. Once the caller is done (and has released its borrows),
//!    it drains the dirty entries and runs the listener callbacks produced by [`Listeners`](data_model::Listeners).
//!
//! That last point is what gives "update, then render": a listener never observes a half-applied change.

pub mod data_model;

/// A pure state transition. The state is consumed and the next state is returned.
pub trait Reducer: Sized {
    type Action;

    fn reduce(self, action: &Self::Action) -> Self;
}
