//! Target compounds and ion list files
//!
//! Ion lists are JSON documents grouping compounds into named lists:
//!
//! ```json
//! {
//!   "amino_acids": {
//!     "Lysine": { "ions": [147.1128, 130.0863], "info": ["[M+H]+", "[M+H-NH3]+"] },
//!     "_comment": "keys starting with an underscore are metadata"
//!   },
//!   "_adducts": ["[M+H]+", "[M-H]-"]
//! }
//! ```
//!
//! The `info` strings label the ions by position.

use std::collections::HashSet;
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{read_file, ConfigError};
use crate::xic::{Ion, XicError};

/// A named analyte and the ions that represent it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Compound {
    name: String,
    ions: Vec<Ion>,
    labels: Vec<String>,
}

impl Compound {
    /// Build a compound from target m/z values and their labels
    ///
    /// Ions are unique by m/z; the first occurrence keeps its position and
    /// label.
    pub fn new(
        name: impl Into<String>,
        mzs: &[f64],
        labels: Vec<String>,
    ) -> Result<Self, XicError> {
        let ions = mzs
            .iter()
            .enumerate()
            .map(|(i, &mz)| {
                let ion = Ion::new(mz)?;
                Ok(match labels.get(i) {
                    Some(label) => ion.with_label(label.clone()),
                    None => ion,
                })
            })
            .collect::<Result<Vec<Ion>, XicError>>()?;

        let mut compound = Self::from_ions(name, ions);
        compound.labels = labels;
        Ok(compound)
    }

    /// Compound from prepared ions, deduplicated by m/z
    ///
    /// Labels are taken from the kept ions.
    pub fn from_ions(name: impl Into<String>, ions: Vec<Ion>) -> Self {
        let name = name.into();
        let mut seen = HashSet::new();
        let ions: Vec<Ion> = ions
            .into_iter()
            .filter(|ion| {
                let fresh = seen.insert(ion.mz().to_bits());
                if !fresh {
                    debug!("{}: dropping duplicate ion m/z {}", name, ion.mz());
                }
                fresh
            })
            .collect();
        let labels = ions
            .iter()
            .filter_map(|ion| ion.label().map(str::to_string))
            .collect();
        Self { name, ions, labels }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ions(&self) -> &[Ion] {
        &self.ions
    }

    /// Free-form ion annotations as given in the ion list
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// A named group of compounds from an ion list file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IonList {
    pub name: String,
    pub compounds: Vec<Compound>,
}

#[derive(Debug, Deserialize)]
struct CompoundEntry {
    #[serde(default)]
    ions: Vec<f64>,
    #[serde(default)]
    info: Vec<String>,
}

/// Read every ion list of a JSON file
pub fn load_ion_lists<P: AsRef<Path>>(path: P) -> Result<Vec<IonList>, ConfigError> {
    parse_ion_lists(&read_file(path.as_ref())?)
}

/// Parse ion lists from a JSON string
///
/// Compounds without ions are skipped with a warning.
pub fn parse_ion_lists(json: &str) -> Result<Vec<IonList>, ConfigError> {
    let root: Value = serde_json::from_str(json)?;
    let Value::Object(lists) = root else {
        return Err(ConfigError::Invalid(
            "ion list file must hold a JSON object".to_string(),
        ));
    };

    let mut out = Vec::new();
    for (list_name, body) in lists {
        if list_name.starts_with('_') {
            continue;
        }
        let Value::Object(entries) = body else {
            return Err(ConfigError::Invalid(format!(
                "ion list '{}' must be a JSON object",
                list_name
            )));
        };

        let mut compounds = Vec::new();
        for (compound_name, entry) in entries {
            if compound_name.starts_with('_') {
                continue;
            }
            let entry: CompoundEntry = serde_json::from_value(entry)?;
            if entry.ions.is_empty() {
                warn!("Compound {} in list {} has no ions, skipping", compound_name, list_name);
                continue;
            }
            compounds.push(Compound::new(compound_name, &entry.ions, entry.info)?);
        }

        debug!("Ion list {}: {} compounds", list_name, compounds.len());
        out.push(IonList {
            name: list_name,
            compounds,
        });
    }
    Ok(out)
}
