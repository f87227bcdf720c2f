mod settings;

pub use settings::{
    generate_default_config, HadoopSettings, HostSettings, LxcSettings, RetrySettings, ServerSettings, Settings,
    SshSettings, TopologySettings,
};
