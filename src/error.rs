/// Errors raised by search-space construction, oracle assembly and the
/// ask/tell protocol.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when a parameter is declared with invalid bounds, choices or types.
    #[error("incorrect input values for parameter '{name}': {reason}")]
    IncorrectInputValues {
        /// The name of the offending parameter.
        name: String,
        /// Why the declaration was rejected.
        reason: String,
    },

    /// Returned when a DSL oracle name is not registered.
    #[error("search oracle '{0}' not found")]
    OracleNotFound(String),

    /// Returned when a DSL plugin name is not registered.
    #[error("plugin '{0}' not found")]
    PluginNotFound(String),

    /// Returned when a DSL meta-oracle name is not registered.
    #[error("meta-oracle '{0}' not found")]
    MetaOracleNotFound(String),

    /// Returned when the oracle DSL cannot be parsed.
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        /// 1-based line of the offending token.
        line: usize,
        /// 1-based column of the offending token.
        column: usize,
        /// Human-readable description, including the offending token.
        message: String,
    },

    /// Returned when an acquisition function cannot be used with the chosen regressor.
    #[error("acquisition function '{acquisition}' is not supported by regressor '{regressor}'")]
    UnsupportedAcquisition {
        /// Requested acquisition name.
        acquisition: String,
        /// Name of the configured regressor.
        regressor: String,
    },

    /// Returned when a DSL parameter has the wrong type, range or name.
    #[error("invalid parameter '{parameter}' for '{oracle}': {reason}")]
    InvalidOracleParameter {
        /// The oracle, plugin or meta-oracle the parameter was given to.
        oracle: String,
        /// The parameter name.
        parameter: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Returned when a plugin is attached to an oracle that has no bounds to act on.
    #[error("oracle '{oracle}' does not accept plugins")]
    PluginUnsupported {
        /// Name of the oracle.
        oracle: String,
    },

    /// Returned when the bandit is rewarded for an arm it does not track.
    #[error("unknown bandit arm {arm} (bandit has {n_arms} arms)")]
    UnknownArm {
        /// The arm that was rewarded.
        arm: usize,
        /// Number of arms the bandit tracks.
        n_arms: usize,
    },

    /// Returned when a configuration references a parameter that is not in the search space.
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    /// Returned when a configuration value does not fit its parameter.
    #[error("invalid value for parameter '{name}': {reason}")]
    InvalidValue {
        /// The parameter name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Returned when a YAML search-space document cannot be parsed.
    #[error("yaml error: {0}")]
    Yaml(String),

    /// Returned when a search-space file cannot be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when an internal invariant is violated.
    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl Error {
    pub(crate) fn incorrect(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::IncorrectInputValues {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_param(
        oracle: impl Into<String>,
        parameter: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidOracleParameter {
            oracle: oracle.into(),
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml(err.to_string())
    }
}

pub type Result<T> = core::result::Result<T, Error>;
