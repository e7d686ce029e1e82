pub mod context;
pub mod resolver;

pub use context::{BindingMode, IdentityContext, IdentityContextBuilder, SubjectId, TenantScope};
pub use resolver::{CacheKeyScope, IdentityResolver, ResolutionError};
