use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
	#[error("a provider named '{0}' is already registered")]
	Duplicate(String),
}
