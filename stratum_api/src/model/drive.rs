use std::{fmt, path::PathBuf, str::FromStr};

use enumflags2::{bitflags, BitFlags};
use serde::{Deserialize, Serialize};
use strum_macros::{EnumIter, IntoStaticStr};

/// Transport used to talk to a drive.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Protocol {
    Nvme,
    Sata,
    Sas,
    /// Anything else, e.g. `usb` or an empty transport for loop devices.
    Other(String),
}

impl FromStr for Protocol {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "nvme" => Self::Nvme,
            "sata" => Self::Sata,
            "sas" => Self::Sas,
            other => Self::Other(other.into()),
        })
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nvme => f.write_str("nvme"),
            Self::Sata => f.write_str("sata"),
            Self::Sas => f.write_str("sas"),
            Self::Other(other) => f.write_str(other),
        }
    }
}

/// Erase related features a drive can report.
#[bitflags]
#[repr(u16)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, EnumIter, IntoStaticStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Capability {
    /// NVMe sanitize with the crypto erase action.
    NvmeSanitizeCryptoErase,
    /// NVMe sanitize with the block erase action.
    NvmeSanitizeBlockErase,
    /// NVMe format supports a cryptographic secure erase.
    NvmeFormatCryptoErase,
    /// ATA SANITIZE feature set.
    AtaSanitize,
    /// ATA CRYPTO SCRAMBLE EXT sanitize command.
    AtaCryptoScramble,
    /// ATA BLOCK ERASE EXT sanitize command.
    AtaBlockEraseExt,
    /// ATA security feature set supports enhanced erase.
    EnhancedSecureErase,
    /// The drive reports an estimated time for the enhanced security erase.
    EnhancedEraseTime,
    /// Data Set Management TRIM.
    Trim,
}

impl Capability {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

pub type Capabilities = BitFlags<Capability>;

/// A drive as reported by the inventory. Read only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Drive {
    pub logical_name: PathBuf,
    pub protocol: Protocol,
    pub capabilities: Capabilities,
    pub model: String,
    pub serial: String,
    pub capacity_bytes: u64,
}

impl Drive {
    pub fn new(logical_name: impl Into<PathBuf>, protocol: Protocol) -> Self {
        Self {
            logical_name: logical_name.into(),
            protocol,
            capabilities: Capabilities::empty(),
            model: String::new(),
            serial: String::new(),
            capacity_bytes: 0,
        }
    }

    pub fn with_capabilities(mut self, capabilities: impl Into<Capabilities>) -> Self {
        self.capabilities = capabilities.into();
        self
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol() {
        assert_eq!("NVMe".parse::<Protocol>().unwrap(), Protocol::Nvme);
        assert_eq!("sata".parse::<Protocol>().unwrap(), Protocol::Sata);
        assert_eq!("sas".parse::<Protocol>().unwrap(), Protocol::Sas);
        assert_eq!(
            "usb".parse::<Protocol>().unwrap(),
            Protocol::Other("usb".into())
        );
        assert_eq!(Protocol::Other("usb".into()).to_string(), "usb");
    }

    #[test]
    fn test_capabilities() {
        let drive = Drive::new("/dev/sda", Protocol::Sata)
            .with_capabilities(Capability::AtaSanitize | Capability::Trim);
        assert!(drive.has(Capability::AtaSanitize));
        assert!(drive.has(Capability::Trim));
        assert!(!drive.has(Capability::AtaCryptoScramble));
        assert_eq!(Capability::EnhancedEraseTime.name(), "enhanced-erase-time");
    }
}
