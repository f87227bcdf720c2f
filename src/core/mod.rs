pub mod executor;
pub mod identity;
pub mod lxc;
pub mod router;
pub mod template;

// exports for lazy devs like us
pub use executor::{CommandOutput, Credential, Credentials, DryRunExecutor, ExecutionContext, RemoteExecutor, SshExecutor};
pub use identity::{ContainerIdentity, NodeAddress, Role};
pub use lxc::ContainerLayout;
pub use router::{HostRouter, PhysicalHost};
pub use template::{RenderRequest, TemplateRenderer};
