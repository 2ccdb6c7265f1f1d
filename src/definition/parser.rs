#![allow(clippy::used_underscore_binding)]

use crate::{Definition, Factory, Property, RawFactory, TypeKind};
use derive_more::{Display, Error};
use tracing::trace;

/// The signature of a factory cannot be turned into a definition.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ParseError {
    /// The factory has no callable body.
    #[display(fmt = "{} is not a function", factory)]
    NotAFunction {
        /// The identity of the factory.
        factory: String,
    },

    /// A parameter is neither a struct nor an interface.
    #[display(
        fmt = "invalid argument type {} at position {} of {}",
        ty,
        position,
        factory
    )]
    InvalidArgument {
        /// The identity of the factory.
        factory: String,
        /// The zero-based position of the parameter.
        position: usize,
        /// The name of the parameter type.
        ty: String,
    },

    /// The factory does not return exactly one struct or interface.
    #[display(fmt = "invalid factory function output of {}: {}", factory, reason)]
    InvalidOutput {
        /// The identity of the factory.
        factory: String,
        /// What is wrong with the output.
        reason: String,
    },

    /// The resulting definition is incomplete.
    #[display(fmt = "invalid definition produced by {}", factory)]
    InvalidDefinition {
        /// The identity of the factory.
        factory: String,
    },
}

/// Turns a factory and its configuration into a [`Definition`].
///
/// Every parameter must be a struct or an interface and becomes one
/// dependency, named after the canonical name of its type. The factory must
/// return exactly one struct or interface, whose canonical name becomes the
/// name of the definition. Unit outputs count as no output and tuple
/// outputs as several.
pub fn parse_definition(
    factory: RawFactory,
    property: &Property,
) -> Result<Definition, ParseError> {
    let factory_name = factory.id().to_string();
    let body = factory.body().cloned().ok_or_else(|| ParseError::NotAFunction {
        factory: factory_name.clone(),
    })?;

    let mut depends_on = Vec::with_capacity(factory.inputs().len());
    for (position, input) in factory.inputs().iter().enumerate() {
        if !input.kind().is_injectable() {
            return Err(ParseError::InvalidArgument {
                factory: factory_name,
                position,
                ty: input.name().to_owned(),
            });
        }
        depends_on.push(input.canonical_name());
    }

    let output = match factory.outputs() {
        [output] => *output,
        [] => {
            return Err(ParseError::InvalidOutput {
                factory: factory_name,
                reason: "no return value".to_owned(),
            })
        }
        outputs => {
            return Err(ParseError::InvalidOutput {
                factory: factory_name,
                reason: format!("{} return values", outputs.len()),
            })
        }
    };
    match output.kind() {
        TypeKind::Struct | TypeKind::Interface => {}
        TypeKind::Unit => {
            return Err(ParseError::InvalidOutput {
                factory: factory_name,
                reason: "no return value".to_owned(),
            })
        }
        TypeKind::Tuple => {
            return Err(ParseError::InvalidOutput {
                factory: factory_name,
                reason: format!("multiple return values {}", output.name()),
            })
        }
        kind => {
            return Err(ParseError::InvalidOutput {
                factory: factory_name,
                reason: format!("{} is a {} type", output.name(), kind),
            })
        }
    }

    let argn = depends_on.len();
    let definition = Definition {
        name: output.canonical_name(),
        ty: output,
        factory: Factory::new(factory.id().clone(), factory.location(), argn, body),
        depends_on,
        methods: factory.methods(),
        scope: property.scope,
        desc: property.desc.clone(),
        lazy_init: property.lazy_init,
        auto_startup: property.auto_startup,
        tags: property.tags(),
    };
    if !definition.is_valid() {
        return Err(ParseError::InvalidDefinition {
            factory: factory_name,
        });
    }

    trace!(
        name = %definition.name(),
        factory = %factory_name,
        dependencies = argn,
        "parsed definition"
    );
    Ok(definition)
}
