use std::fmt;

/// ChannelId is the full SEED address of one data channel.
///
/// Ordering and hashing use all four codes, so two segments belong to the same channel
/// exactly when their ChannelIds compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
}

impl ChannelId {
    /// Construct a new channel id, stripping the space padding used in record headers
    pub fn new(network: &str, station: &str, location: &str, channel: &str) -> Self {
        ChannelId {
            network: network.trim().to_string(),
            station: station.trim().to_string(),
            location: location.trim().to_string(),
            channel: channel.trim().to_string(),
        }
    }

    /// The component code, i.e. the orientation letter at the end of the channel code
    pub fn component(&self) -> Option<char> {
        self.channel.chars().last()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}
