//! Resolves a basis-set name and element symbol to parsed shells.
//!
//! Lookup order: a user-supplied directory of `<basis>.<symbol>.nwchem`
//! files, the data bundled with this crate, and finally the Basis Set
//! Exchange REST API.

use crate::cgto::{AtomicBasis, BasisError};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

const BUNDLED: &[(&str, &str, &str)] = &[
    ("sto-3g", "H", include_str!("../data/sto-3g.h.nwchem")),
    ("sto-3g", "C", include_str!("../data/sto-3g.c.nwchem")),
    ("sto-3g", "N", include_str!("../data/sto-3g.n.nwchem")),
    ("sto-3g", "O", include_str!("../data/sto-3g.o.nwchem")),
];

/// Canonical spelling used for file names and the download API,
/// e.g. `STO3G` -> `sto-3g`.
pub fn canonical_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    match lower.as_str() {
        "sto3g" => "sto-3g".to_string(),
        "631g" => "6-31g".to_string(),
        _ => lower,
    }
}

#[derive(Debug, Clone)]
pub struct BasisLibrary {
    local_dir: Option<PathBuf>,
    allow_download: bool,
}

impl Default for BasisLibrary {
    fn default() -> Self {
        BasisLibrary {
            local_dir: None,
            allow_download: true,
        }
    }
}

impl BasisLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_dir = Some(dir.into());
        self
    }

    /// Never touch the network; unknown basis sets become errors.
    pub fn offline(mut self) -> Self {
        self.allow_download = false;
        self
    }

    pub fn load(&self, name: &str, symbol: &str) -> Result<AtomicBasis, BasisError> {
        let name = canonical_name(name);
        let text = self.raw_nwchem(&name, symbol)?;
        let mut parsed = AtomicBasis::parse_nwchem(&text, &name)?;

        // the BSE may spell symbols in upper case
        let key = parsed
            .keys()
            .find(|k| k.eq_ignore_ascii_case(symbol))
            .cloned()
            .ok_or_else(|| BasisError::MissingElement {
                basis: name.clone(),
                element: symbol.to_string(),
            })?;
        let basis = parsed.remove(&key).ok_or_else(|| BasisError::MissingElement {
            basis: name.clone(),
            element: symbol.to_string(),
        })?;
        info!(
            "Loaded {} basis for {}: {} contracted functions",
            name,
            symbol,
            basis.basis_set.len()
        );
        Ok(basis)
    }

    fn raw_nwchem(&self, name: &str, symbol: &str) -> Result<String, BasisError> {
        if let Some(dir) = &self.local_dir {
            let path = dir.join(format!("{}.{}.nwchem", name, symbol.to_lowercase()));
            if path.exists() {
                debug!("Reading basis from {}", path.display());
                return fs::read_to_string(&path).map_err(|source| BasisError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        }

        if let Some((_, _, text)) = BUNDLED
            .iter()
            .find(|(b, s, _)| *b == name && s.eq_ignore_ascii_case(symbol))
        {
            debug!("Using bundled {} data for {}", name, symbol);
            return Ok(text.to_string());
        }

        if !self.allow_download {
            return Err(BasisError::MissingElement {
                basis: name.to_string(),
                element: symbol.to_string(),
            });
        }
        fetch_nwchem(name, symbol)
    }
}

fn fetch_nwchem(name: &str, symbol: &str) -> Result<String, BasisError> {
    let url = format!(
        "https://www.basissetexchange.org/api/basis/{}/format/nwchem/?elements={}",
        name, symbol
    );
    info!("Fetching {} basis for {} from {}", name, symbol, url);

    let fetch_err = |reason: String| BasisError::Fetch {
        basis: name.to_string(),
        element: symbol.to_string(),
        reason,
    };
    let response = reqwest::blocking::get(&url).map_err(|e| fetch_err(e.to_string()))?;
    if !response.status().is_success() {
        return Err(fetch_err(format!("HTTP status {}", response.status())));
    }
    let text = response.text().map_err(|e| fetch_err(e.to_string()))?;
    debug!("Received {} characters from the basis set API", text.len());
    Ok(text)
}
