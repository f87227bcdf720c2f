use crate::config::LxcSettings;
use crate::core::identity::ContainerIdentity;
use crate::core::template::shell_quote;

/// Where things live on an LXC host and how containers are driven.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerLayout {
    root: String,
    template: String,
    worker_list: String,
}

impl ContainerLayout {
    /// `worker_list` is the path of Hadoop's slaves file inside the container.
    pub fn new(settings: &LxcSettings, worker_list: impl Into<String>) -> Self {
        Self {
            root: settings.root.trim_end_matches('/').to_string(),
            template: settings.template.clone(),
            worker_list: worker_list.into(),
        }
    }

    pub fn rootfs(&self, name: &ContainerIdentity) -> String {
        format!("{}/{}/rootfs", self.root, name)
    }

    pub fn network_template(&self, name: &ContainerIdentity) -> String {
        format!("{}/etc/network/interfaces.template", self.rootfs(name))
    }

    pub fn network_config(&self, name: &ContainerIdentity) -> String {
        format!("{}/etc/network/interfaces", self.rootfs(name))
    }

    pub fn hosts_template(&self, name: &ContainerIdentity) -> String {
        format!("{}/etc/hosts.template", self.rootfs(name))
    }

    pub fn hosts_file(&self, name: &ContainerIdentity) -> String {
        format!("{}/etc/hosts", self.rootfs(name))
    }

    pub fn worker_list_file(&self, master: &ContainerIdentity) -> String {
        format!("{}/{}", self.rootfs(master), self.worker_list.trim_start_matches('/'))
    }

    pub fn clone_command(&self, name: &ContainerIdentity) -> String {
        format!("lxc-clone -o {} -n {}", shell_quote(&self.template), name)
    }

    pub fn start_command(&self, name: &ContainerIdentity) -> String {
        format!("lxc-start -n {} -d", name)
    }

    /// Already-stopped containers pass; missing ones still fail.
    pub fn stop_command(&self, name: &ContainerIdentity) -> String {
        format!("lxc-info -n {0} -s | grep -q STOPPED || lxc-stop -n {0}", name)
    }

    pub fn destroy_command(&self, name: &ContainerIdentity) -> String {
        format!("lxc-destroy -n {}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::{NodeAddress, Role};

    fn layout() -> ContainerLayout {
        let settings = LxcSettings {
            root: "/var/lib/lxc/".into(),
            template: "template".into(),
        };
        ContainerLayout::new(&settings, "/home/hadoop/hadoop-2.6.0/etc/hadoop/slaves")
    }

    fn master() -> ContainerIdentity {
        ContainerIdentity::resolve(&NodeAddress::parse("198.51.100.10").unwrap(), Role::Master)
    }

    #[test]
    fn paths_live_under_the_container_rootfs() {
        let layout = layout();
        let name = master();
        assert_eq!(layout.rootfs(&name), "/var/lib/lxc/master-10/rootfs");
        assert_eq!(
            layout.network_template(&name),
            "/var/lib/lxc/master-10/rootfs/etc/network/interfaces.template"
        );
        assert_eq!(layout.hosts_file(&name), "/var/lib/lxc/master-10/rootfs/etc/hosts");
        assert_eq!(
            layout.worker_list_file(&name),
            "/var/lib/lxc/master-10/rootfs/home/hadoop/hadoop-2.6.0/etc/hadoop/slaves"
        );
    }

    #[test]
    fn lxc_command_lines() {
        let layout = layout();
        let name = master();
        assert_eq!(layout.clone_command(&name), "lxc-clone -o template -n master-10");
        assert_eq!(layout.start_command(&name), "lxc-start -n master-10 -d");
        assert_eq!(
            layout.stop_command(&name),
            "lxc-info -n master-10 -s | grep -q STOPPED || lxc-stop -n master-10"
        );
        assert_eq!(layout.destroy_command(&name), "lxc-destroy -n master-10");
    }
}
