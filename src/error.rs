//! Error types for the singleton registry

use thiserror::Error;

/// Boxed error raised by a user-supplied factory or destroy callback
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during registry operations
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A name or alias was the empty string
    #[error("Name must not be empty")]
    EmptyName,

    /// A different object is already bound under this name
    #[error("Could not register object under name '{name}': there is already a different object bound")]
    AlreadyRegistered { name: String },

    /// A destroy callback was already registered for this name
    #[error("Destroy callback already registered for '{name}'")]
    DisposableAlreadyRegistered { name: String },

    /// The name was requested again while its own construction is running
    /// and no early reference is available
    #[error("Requested object '{name}' is currently in creation: is there an unresolvable circular reference?")]
    CyclicCreation { name: String },

    /// The factory for `name` failed
    #[error("Error creating object '{name}': {source}")]
    CreationFailed {
        name: String,
        #[source]
        source: Box<RegistryError>,
        /// Errors recorded as suppressed while the construction was in progress
        suppressed: Vec<RegistryError>,
    },

    /// Construction was attempted while (or after) the registry was destroyed
    #[error("Creation of '{name}' not allowed while singletons of this registry are in destruction")]
    ShutdownInProgress { name: String },

    /// A pending factory was registered for a name that is not in creation
    #[error("Object '{name}' is not currently in creation")]
    NotInCreation { name: String },

    /// Registering the alias would close an alias cycle
    #[error("Cannot register alias '{alias}' for name '{name}': circular reference - '{name}' is a direct or indirect alias for '{alias}' already")]
    CircularAlias { alias: String, name: String },

    /// The alias is bound to another name and overriding is disabled
    #[error("Cannot define alias '{alias}' for name '{name}': it is already registered for name '{registered}'")]
    DuplicateAlias {
        alias: String,
        name: String,
        registered: String,
    },

    /// The alias is not registered
    #[error("No alias '{alias}' registered")]
    NoSuchAlias { alias: String },

    /// Error raised by a user callback
    #[error(transparent)]
    Callback(BoxError),
}

impl RegistryError {
    /// Wrap an arbitrary callback error
    #[inline]
    pub fn callback(err: impl Into<BoxError>) -> Self {
        Self::Callback(err.into())
    }

    /// Create a CreationFailed error
    #[inline]
    pub fn creation_failed(
        name: impl Into<String>,
        source: RegistryError,
        suppressed: Vec<RegistryError>,
    ) -> Self {
        Self::CreationFailed {
            name: name.into(),
            source: Box::new(source),
            suppressed,
        }
    }

    /// Create an AlreadyRegistered error
    #[inline]
    pub fn already_registered(name: impl Into<String>) -> Self {
        Self::AlreadyRegistered { name: name.into() }
    }

    /// Create a CyclicCreation error
    #[inline]
    pub fn cyclic(name: impl Into<String>) -> Self {
        Self::CyclicCreation { name: name.into() }
    }

    /// Create a ShutdownInProgress error
    #[inline]
    pub fn shutdown(name: impl Into<String>) -> Self {
        Self::ShutdownInProgress { name: name.into() }
    }

    /// Suppressed errors attached to a `CreationFailed`, empty otherwise
    pub fn suppressed(&self) -> &[RegistryError] {
        match self {
            Self::CreationFailed { suppressed, .. } => suppressed,
            _ => &[],
        }
    }

    /// Follow `CreationFailed` wrappers down to the error the innermost
    /// factory actually raised
    pub fn root_cause(&self) -> &RegistryError {
        let mut current = self;
        while let Self::CreationFailed { source, .. } = current {
            current = source;
        }
        current
    }
}

pub(crate) fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RegistryError::EmptyName);
    }
    Ok(())
}

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
