pub fn set_panic_hook() {
    // When the `console_error_panic_hook` feature is enabled, we can call the
    // `set_panic_hook` function at least once during initialization, and then
    // we will get better error messages if our code ever panics.
    //
    // For more details see
    // https://github.com/rustwasm/console_error_panic_hook#readme
    #[cfg(all(target_arch = "wasm32", feature = "console_error_panic_hook"))]
    console_error_panic_hook::set_once();
}

pub fn init_logger() {
    #[cfg(target_arch = "wasm32")]
    wasm_logger::init(wasm_logger::Config::default());

    #[cfg(not(target_arch = "wasm32"))]
    {
        // another embedder may have installed a logger already
        let _ = env_logger::try_init();
    }
}
