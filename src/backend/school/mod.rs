//! School Domain Integration
//!
//! Default principal resolvers for the entity types the school backend
//! reports changes for.
//!
//! | entity type | notified principals |
//! |---|---|
//! | `grades` | student, class teacher, guardians |
//! | `attendance` | student, class teacher, guardians |
//! | `assignments` | class teacher, enrolled students |

pub mod resolvers;

pub use resolvers::{payload_hint, SchoolEntity, SchoolResolver};

use sqlx::PgPool;

use crate::backend::sync::ResolverRegistry;

/// Register the resolvers for grades, attendance and assignments
pub fn register_school_resolvers(registry: &mut ResolverRegistry, pool: &PgPool) {
    for entity in SchoolEntity::ALL {
        registry.register(
            entity.entity_type(),
            entity.category(),
            entity.label(),
            SchoolResolver::new(pool.clone(), entity),
        );
    }
    tracing::info!("[Router] School resolvers registered");
}
