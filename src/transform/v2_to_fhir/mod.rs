//! HL7 v2 to FHIR-shaped record transformers.

mod common;

pub mod adt_a01;
pub mod adt_a03;
pub mod adt_a08;
pub mod orm_o01;
pub mod oru_r01;

pub use adt_a01::AdtA01Transformer;
pub use adt_a03::AdtA03Transformer;
pub use adt_a08::AdtA08Transformer;
pub use orm_o01::OrmO01Transformer;
pub use oru_r01::OruR01Transformer;

use tracing::debug;

use super::{RegistryError, Transformer, TransformerRegistry};

type Factory = fn() -> Box<dyn Transformer>;

/// Built-in handlers, in registration order.
fn builtin_factories() -> [(&'static str, Factory); 5] {
    [
        ("ADT^A01", || Box::new(AdtA01Transformer)),
        ("ADT^A03", || Box::new(AdtA03Transformer)),
        ("ADT^A08", || Box::new(AdtA08Transformer)),
        ("ORM^O01", || Box::new(OrmO01Transformer)),
        ("ORU^R01", || Box::new(OruR01Transformer)),
    ]
}

/// Register the built-in handlers.
///
/// Codes that are already bound are left alone, so calling this more than
/// once is harmless.
pub fn populate_builtin(registry: &mut TransformerRegistry) -> Result<(), RegistryError> {
    for (code, factory) in builtin_factories() {
        if registry.contains(code) {
            debug!(event = code, "Already registered, skipping");
            continue;
        }
        registry.register(code, factory)?;
    }
    Ok(())
}

/// A registry holding every built-in handler.
pub fn builtin_registry() -> Result<TransformerRegistry, RegistryError> {
    let mut registry = TransformerRegistry::new();
    populate_builtin(&mut registry)?;
    Ok(registry)
}
