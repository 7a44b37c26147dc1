use std::fmt::{Debug, Display, Write};
use std::{borrow::Cow, panic::Location};

use serde::{ser::SerializeStruct, Deserialize, Serialize};
use strum_macros::IntoStaticStr;

use crate::config::StorageLayoutValidationError;

/// Stratum failed to run because the execution environment was misconfigured.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionEnvironmentMisconfigurationError {
    #[error("Required binary '{binary}' could not be found")]
    MissingBinary { binary: &'static str },
}

/// Operator provided input was invalid. Nothing has been touched on the host.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidInputError {
    #[error("Invalid RAID type '{raid_type}', expected 'linuxsw' or 'hardware'")]
    InvalidRaidType { raid_type: String },
    #[error("Invalid RAID object type '{object_type}', expected 'vd' or 'pd'")]
    InvalidRaidObjectType { object_type: String },
    #[error("Invalid delimited partition '{spec}', expected NAME:POSITION:SIZE:TYPE")]
    InvalidDelimitedPartition { spec: String },
    #[error("Failed partitioning, position {position} is outside of [1, 128]")]
    FailedPartitioning { position: i64 },
    #[error("Unknown filesystem '{label}'")]
    UnknownFileSystem { label: String },
    #[error("Invalid controller physical device ID '{id}'")]
    InvalidControllerDeviceId { id: String },
    #[error("Wipe timeout must be greater than zero")]
    InvalidTimeout,
    #[error("Either --device and --partition or --filesystem-device must be provided")]
    MissingFormatTarget,
    #[error("Block device has no device file")]
    MissingDeviceFile,
    #[error("Failed to load storage layout from '{path}'")]
    LoadStorageLayout { path: String },
    #[error("Failed to parse storage layout")]
    ParseStorageLayout,
    #[error("Invalid storage layout: {0}")]
    InvalidStorageLayout(#[from] StorageLayoutValidationError),
}

/// A device referenced by the request is not a usable block device.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationError {
    #[error("Block device '{device}' failed validation")]
    BlockDeviceFailedValidation { device: String },
    #[error("RAID array member '{device}' failed validation")]
    ArrayDeviceFailedValidation { device: String },
}

/// Something requested by name could not be found on the host.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum LookupError {
    #[error("Drive '{disk}' does not exist")]
    DriveNotExist { disk: String },
    #[error("No appropriate wiper found for drive '{disk}' with protocol '{protocol}'")]
    DriveWiperNotFound { disk: String, protocol: String },
    #[error("Virtual disk '{name}' not found")]
    VirtualDiskNotFound { name: String },
    #[error("RAID array '{name}' not found")]
    ArrayNotFound { name: String },
    #[error("No storage controller from vendor '{vendor}' found")]
    ControllerNotFound { vendor: &'static str },
}

/// Some step while provisioning or retiring storage failed.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum ServicingError {
    #[error("Failed to execute '{binary}'")]
    CommandCouldNotExecute { binary: &'static str },
    #[error("Command '{binary}' failed: {explanation}")]
    CommandFailed {
        binary: &'static str,
        explanation: String,
    },
    #[error("Failed to create partitions")]
    CreatePartitions,
    #[error("Failed to expose partitions of a loop device")]
    ExposePartitions,
    #[error("Failed to create RAID array")]
    CreateRaid,
    #[error("Failed to delete RAID array")]
    DeleteRaid,
    #[error("Failed to list RAID objects")]
    ListRaid,
    #[error("Failed to format filesystem")]
    FormatFileSystem,
    #[error("Failed to read filesystem UUID")]
    ReadFileSystemUuid,
    #[error("Failed to collect drive inventory")]
    CollectInventory,
    #[error("Failed to wipe drive")]
    WipeDrive,
    #[error("Wipe deadline exceeded")]
    WipeDeadlineExceeded,
    #[error("{failed} of {total} drive wipes failed")]
    WipeFailed { failed: usize, total: usize },
    #[error("Failed to write wipe report to '{path}'")]
    WriteWipeReport { path: String },
}

#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InternalError {
    #[error("Internal error: {0}")]
    Internal(&'static str),

    #[error("Failed to serialize wipe report")]
    SerializeWipeReport,
    #[error("Failed to join wipe task")]
    JoinWipeTask,
    #[error("Failed to start async runtime")]
    StartRuntime,
    #[error("Failed to serialize storage layout")]
    SerializeStorageLayout,
}

/// Each variant of `ErrorKind` corresponds to a different category of error. The categories are
/// intended to let automated callers branch on the cause of a failure.
#[derive(Debug, Eq, thiserror::Error, IntoStaticStr, PartialEq)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    /// Stratum failed to run because the execution environment was misconfigured.
    #[error(transparent)]
    ExecutionEnvironmentMisconfiguration(#[from] ExecutionEnvironmentMisconfigurationError),

    /// The request was malformed. Always reported before any side effect.
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),

    /// A device failed validation. Always reported before any destructive command.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A drive, array or virtual disk could not be found.
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// An external command or host operation failed.
    #[error(transparent)]
    Servicing(#[from] ServicingError),

    /// A bug in Stratum.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Debug)]
struct StratumErrorInner {
    kind: ErrorKind,
    location: &'static Location<'static>,
    source: Option<anyhow::Error>,
    context: Vec<(Cow<'static, str>, &'static Location<'static>)>,
}

pub struct StratumError(Box<StratumErrorInner>);
impl StratumError {
    #[track_caller]
    pub fn new(kind: impl Into<ErrorKind>) -> Self {
        StratumError(Box::new(StratumErrorInner {
            kind: kind.into(),
            location: Location::caller(),
            source: None,
            context: Vec::new(),
        }))
    }

    #[track_caller]
    pub fn with_source(kind: impl Into<ErrorKind>, source: anyhow::Error) -> Self {
        StratumError(Box::new(StratumErrorInner {
            kind: kind.into(),
            location: Location::caller(),
            source: Some(source),
            context: Vec::new(),
        }))
    }

    #[track_caller]
    pub fn internal(message: &'static str) -> Self {
        Self::new(InternalError::Internal(message))
    }

    pub fn unstructured(self, context: impl Into<Cow<'static, str>>) -> anyhow::Error {
        match self.0.source {
            Some(source) => source.context(self.0.kind).context(context.into()),
            None => anyhow::Error::from(self.0.kind).context(context.into()),
        }
    }

    /// Returns a reference to the inner ErrorKind.
    pub fn kind(&self) -> &ErrorKind {
        &self.0.kind
    }
}

pub trait ReportError<T, K> {
    /// Convert this error into a structured StratumError.
    fn structured(self, kind: K) -> Result<T, StratumError>;
}

impl<T, K> ReportError<T, K> for Option<T>
where
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, StratumError> {
        match self {
            Some(t) => Ok(t),
            None => Err(StratumError(Box::new(StratumErrorInner {
                kind: kind.into(),
                location: Location::caller(),
                source: None,
                context: Vec::new(),
            }))),
        }
    }
}

impl<T, E, K> ReportError<T, K> for Result<T, E>
where
    E: Into<anyhow::Error>,
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, StratumError> {
        match self {
            Ok(o) => Ok(o),
            Err(e) => Err(StratumError(Box::new(StratumErrorInner {
                kind: kind.into(),
                location: Location::caller(),
                source: Some(e.into()),
                context: Vec::new(),
            }))),
        }
    }
}

pub trait StratumResultExt<T> {
    /// Attach a context message to the error.
    fn message(self, context: impl Into<Cow<'static, str>>) -> Result<T, StratumError>;

    /// Convert the error into an unstructured error.
    fn unstructured(self, context: impl Into<Cow<'static, str>>) -> Result<T, anyhow::Error>;
}
impl<T> StratumResultExt<T> for Result<T, StratumError> {
    #[track_caller]
    fn message(mut self, context: impl Into<Cow<'static, str>>) -> Result<T, StratumError> {
        if let Err(ref mut e) = self {
            e.0.context.push((context.into(), Location::caller()));
        }
        self
    }

    fn unstructured(self, context: impl Into<Cow<'static, str>>) -> Result<T, anyhow::Error> {
        self.map_err(|e| e.unstructured(context))
    }
}

impl Serialize for StratumError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("stratum-error", 5)?;
        state.serialize_field("message", &self.0.kind.to_string())?;
        match self.0.kind {
            ErrorKind::ExecutionEnvironmentMisconfiguration(ref e) => {
                state.serialize_field("error", e)?
            }
            ErrorKind::InvalidInput(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Validation(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Lookup(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Servicing(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Internal(ref e) => state.serialize_field("error", e)?,
        }
        state.serialize_field("category", <&str>::from(&self.0.kind))?;
        state.serialize_field(
            "location",
            &format!("{}:{}", self.0.location.file(), self.0.location.line()),
        )?;
        match self.0.source {
            Some(ref e) => state.serialize_field("cause", &Some(format!("{:?}", e)))?,
            None => state.serialize_field("cause", &None::<String>)?,
        }
        state.end()
    }
}

/// Single-line rendering: the most recent context, the kind, then the cause chain.
impl Display for StratumError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some((context, _)) = self.0.context.last() {
            write!(f, "{context}: ")?;
        }
        write!(f, "{}", self.0.kind)?;
        if let Some(ref source) = self.0.source {
            write!(f, ": {source:#}")?;
        }
        Ok(())
    }
}

impl Debug for StratumError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}:{}",
            self.0.kind,
            self.0.location.file(),
            self.0.location.line()
        )?;

        if !self.0.context.is_empty() {
            writeln!(f, "\n\nContext:")?;
            for (i, (context, location)) in self.0.context.iter().enumerate() {
                for (j, line) in context.split('\n').enumerate() {
                    if j == 0 {
                        write!(f, "{: >5}: ", i)?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                writeln!(f, " at {}:{}", location.file(), location.line())?;
            }
        }

        if let Some(ref source) = self.0.source {
            writeln!(f, "\n\nCaused by:")?;
            let mut index = 0;
            let mut source: Option<&dyn std::error::Error> = Some(source.as_ref());
            while let Some(e) = source {
                for (i, line) in e.to_string().split('\n').enumerate() {
                    if i == 0 {
                        write!(f, "{: >5}: ", index)?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                f.write_char('\n')?;
                source = e.source();
                index += 1;
            }
        }
        Ok(())
    }
}
