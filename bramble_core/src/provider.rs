//! Statically declared provider contracts.
//!
//! A provider type lists the extension points it implements in
//! [`Provider::CONTRACTS`]. [`Configurable`] records registrations against
//! that table, so asking for a contract a type never declared is caught at
//! registration time instead of being discovered later.

use std::any::{TypeId, type_name};

use tracing::{debug, warn};

/// The extension points a provider can fill.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Contract {
    MESSAGE_BODY_READER,
    MESSAGE_BODY_WRITER,
    CONTAINER_REQUEST_FILTER,
    CONTAINER_RESPONSE_FILTER,
    READER_INTERCEPTOR,
    WRITER_INTERCEPTOR,
    EXCEPTION_MAPPER,
    CONTEXT_RESOLVER,
    PARAM_CONVERTER_PROVIDER,
    FEATURE,
}

impl Contract {
    pub const ALL: [Contract; 10] = [
        Contract::MESSAGE_BODY_READER,
        Contract::MESSAGE_BODY_WRITER,
        Contract::CONTAINER_REQUEST_FILTER,
        Contract::CONTAINER_RESPONSE_FILTER,
        Contract::READER_INTERCEPTOR,
        Contract::WRITER_INTERCEPTOR,
        Contract::EXCEPTION_MAPPER,
        Contract::CONTEXT_RESOLVER,
        Contract::PARAM_CONVERTER_PROVIDER,
        Contract::FEATURE,
    ];
}

/// Implemented by every provider type.
///
/// # Examples
///
/// ```rust
/// use bramble_core::provider::{Configurable, Contract, Provider};
///
/// struct JsonWriter;
/// impl Provider for JsonWriter {
///     const CONTRACTS: &'static [Contract] = &[Contract::MESSAGE_BODY_WRITER];
/// }
///
/// let mut config = Configurable::new();
/// assert!(config.register::<JsonWriter>());
/// assert_eq!(config.providers_for(Contract::MESSAGE_BODY_WRITER), vec![std::any::type_name::<JsonWriter>()]);
/// ```
pub trait Provider: 'static {
    const CONTRACTS: &'static [Contract];
}

#[derive(Debug, Clone)]
struct Registration {
    type_id: TypeId,
    name: &'static str,
    contracts: Vec<Contract>,
}

/// Registered providers, in registration order.
#[derive(Debug, Clone, Default)]
pub struct Configurable {
    registrations: Vec<Registration>,
}

impl Configurable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `P` for every contract it declares. Returns false if `P` was
    /// already registered or declares nothing.
    pub fn register<P: Provider>(&mut self) -> bool {
        self.register_contracts::<P>(P::CONTRACTS)
    }

    /// Registers `P` for the requested subset of its contracts. Contracts `P`
    /// does not declare are skipped.
    pub fn register_contracts<P: Provider>(&mut self, requested: &[Contract]) -> bool {
        let name = type_name::<P>();
        if self.is_registered::<P>() {
            warn!(provider = name, "provider already registered, ignoring");
            return false;
        }
        let mut contracts = Vec::new();
        for contract in requested {
            if !P::CONTRACTS.contains(contract) {
                warn!(provider = name, ?contract, "provider does not implement contract, skipping");
                continue;
            }
            if !contracts.contains(contract) {
                contracts.push(*contract);
            }
        }
        if contracts.is_empty() {
            warn!(provider = name, "no usable contracts, provider not registered");
            return false;
        }
        debug!(provider = name, ?contracts, "provider registered");
        self.registrations.push(Registration {
            type_id: TypeId::of::<P>(),
            name,
            contracts,
        });
        true
    }

    pub fn is_registered<P: Provider>(&self) -> bool {
        let id = TypeId::of::<P>();
        self.registrations.iter().any(|registration| registration.type_id == id)
    }

    /// The contracts `P` was registered for, if it was.
    pub fn contracts_of<P: Provider>(&self) -> Option<&[Contract]> {
        let id = TypeId::of::<P>();
        self.registrations
            .iter()
            .find(|registration| registration.type_id == id)
            .map(|registration| registration.contracts.as_slice())
    }

    /// Type names of the providers registered for `contract`.
    pub fn providers_for(&self, contract: Contract) -> Vec<&'static str> {
        self.registrations
            .iter()
            .filter(|registration| registration.contracts.contains(&contract))
            .map(|registration| registration.name)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
