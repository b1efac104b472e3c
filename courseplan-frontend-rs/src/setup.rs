//! The programs a new plan can be seeded from. The server owns the calendars; all the client
//! knows is which keys exist and how to present them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(into_wasm_abi, from_wasm_abi))]
pub struct Program {
    pub name: String,
    /// Starting school year (e.g. `2018-2019`) to the key the server knows the calendar by.
    pub years: BTreeMap<String, String>,
}

/// Department name to the programs it offers, keyed by program name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(into_wasm_abi, from_wasm_abi))]
pub struct ProgramCatalogue {
    pub departments: BTreeMap<String, BTreeMap<String, Program>>,
}

impl ProgramCatalogue {
    pub fn program(&self, department: &str, program: &str) -> Option<&Program> {
        self.departments.get(department)?.get(program)
    }

    pub fn program_key(&self, department: &str, program: &str, year: &str) -> Option<&str> {
        self.program(department, program)?
            .years
            .get(year)
            .map(String::as_str)
    }
}

pub fn programs() -> ProgramCatalogue {
    let software_engineering = Program {
        name: "Software Engineering".to_string(),
        years: BTreeMap::from([(
            "2018-2019".to_string(),
            "uw-software-engineering_2018-2019_stream-8".to_string(),
        )]),
    };

    ProgramCatalogue {
        departments: BTreeMap::from([(
            "Engineering".to_string(),
            BTreeMap::from([(software_engineering.name.clone(), software_engineering)]),
        )]),
    }
}
