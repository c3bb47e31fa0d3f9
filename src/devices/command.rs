//! Batched per-channel command pattern shared by every device capability
//! (spec.md §4.1): `make_commands() -> CmdVec; set_command(vec, channel,
//! cmd); submit(vec)`. Unset channels are no-ops on the device.

/// A command slot per device channel. `None` means "leave this channel
/// alone" - only `Some` slots are acted on by `submit`.
#[derive(Debug, Clone)]
pub struct CmdVec<C> {
    slots: Vec<Option<C>>,
}

impl<C> CmdVec<C> {
    /// A command vector sized to the device's channel count, all unset.
    pub fn new(channel_count: usize) -> Self {
        Self {
            slots: (0..channel_count).map(|_| None).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Set the command for one channel, leaving others untouched.
    pub fn set(&mut self, channel: usize, cmd: C) {
        if let Some(slot) = self.slots.get_mut(channel) {
            *slot = Some(cmd);
        }
    }

    pub fn get(&self, channel: usize) -> Option<&C> {
        self.slots.get(channel).and_then(|s| s.as_ref())
    }

    /// Channels with a command set, in index order.
    pub fn iter_set(&self) -> impl Iterator<Item = (usize, &C)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|c| (i, c)))
    }

    pub fn any_set(&self) -> bool {
        self.slots.iter().any(Option::is_some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_channels_stay_none_until_set() {
        let mut cmds: CmdVec<f64> = CmdVec::new(3);
        assert!(!cmds.any_set());
        cmds.set(1, 42.0);
        assert_eq!(cmds.get(0), None);
        assert_eq!(cmds.get(1), Some(&42.0));
        assert_eq!(cmds.iter_set().collect::<Vec<_>>(), vec![(1, &42.0)]);
    }

    #[test]
    fn out_of_range_set_is_ignored_not_panicking() {
        let mut cmds: CmdVec<f64> = CmdVec::new(2);
        cmds.set(99, 1.0);
        assert!(!cmds.any_set());
    }
}
