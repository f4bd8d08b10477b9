#[cfg(test)]
mod tests {
    use crate::cluster::{ClusterModuleListener, ModuleRegistration, NamingListener};

    fn reg(instance_id: &str, sequence: u32) -> ModuleRegistration {
        ModuleRegistration::new("storage", "memory", instance_id, sequence)
    }

    #[test]
    fn empty_view_elects_nobody() {
        let listener = NamingListener::new("storage");
        assert!(!listener.is_elected(&reg("x", 0)));
        assert!(listener.elected().is_none());
    }

    #[test]
    fn lowest_sorting_instance_is_elected() {
        let listener = NamingListener::new("storage");
        listener.on_membership_changed(vec![reg("y", 0), reg("x", 0)]);

        assert!(listener.is_elected(&reg("x", 0)));
        assert!(!listener.is_elected(&reg("y", 0)));
        let peers = listener.peers();
        assert_eq!(peers.iter().map(|p| p.key()).collect::<Vec<_>>(), vec!["x_0", "y_0"]);
    }

    #[test]
    fn sequence_breaks_ties_within_one_instance() {
        let listener = NamingListener::new("storage");
        listener.on_membership_changed(vec![reg("x", 1), reg("x", 0)]);

        assert!(listener.is_elected(&reg("x", 0)));
        assert!(!listener.is_elected(&reg("x", 1)));
    }

    #[test]
    fn election_moves_when_the_leader_leaves() {
        let listener = NamingListener::new("storage");
        listener.on_membership_changed(vec![reg("x", 0), reg("y", 0)]);
        let before = listener.peers();

        listener.on_membership_changed(vec![reg("y", 0)]);

        assert!(listener.is_elected(&reg("y", 0)));
        // Snapshots taken earlier are unaffected by later updates.
        assert_eq!(before.len(), 2);
    }

    #[test]
    fn duplicate_members_collapse() {
        let listener = NamingListener::new("storage");
        listener.on_membership_changed(vec![reg("x", 0), reg("x", 0), reg("y", 0)]);
        assert_eq!(listener.peers().len(), 2);
    }
}
