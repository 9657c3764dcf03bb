//! Wire messages for the subset of the `lnrpc` services the controller drives.
//!
//! Field tags match the daemon's `.proto` definitions; fields the controller never reads
//! are left out (prost skips unknown tags on decode).

use prost::Message;

// === lnrpc.Lightning ===

#[derive(Clone, PartialEq, Message)]
pub struct GetInfoRequest {}

#[derive(Clone, PartialEq, Message)]
pub struct GetInfoResponse {
    #[prost(string, tag = "1")]
    pub identity_pubkey: String,
    #[prost(string, tag = "2")]
    pub alias: String,
    #[prost(uint32, tag = "3")]
    pub num_pending_channels: u32,
    #[prost(uint32, tag = "4")]
    pub num_active_channels: u32,
    #[prost(uint32, tag = "5")]
    pub num_peers: u32,
    #[prost(uint32, tag = "6")]
    pub block_height: u32,
    #[prost(string, tag = "8")]
    pub block_hash: String,
    #[prost(bool, tag = "9")]
    pub synced_to_chain: bool,
    #[prost(string, tag = "14")]
    pub version: String,
    #[prost(bool, tag = "18")]
    pub synced_to_graph: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct ChannelGraphRequest {
    #[prost(bool, tag = "1")]
    pub include_unannounced: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct ChannelEdge {
    #[prost(uint64, tag = "1")]
    pub channel_id: u64,
    /// `txid:index`, txid in display (reversed) hex.
    #[prost(string, tag = "2")]
    pub chan_point: String,
    #[prost(uint32, tag = "3")]
    pub last_update: u32,
    #[prost(string, tag = "4")]
    pub node1_pub: String,
    #[prost(string, tag = "5")]
    pub node2_pub: String,
    #[prost(int64, tag = "6")]
    pub capacity: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct ChannelGraph {
    #[prost(message, repeated, tag = "2")]
    pub edges: Vec<ChannelEdge>,
}

#[derive(Clone, PartialEq, Message)]
pub struct GraphTopologySubscription {}

/// Funding outpoint of a channel.
#[derive(Clone, PartialEq, Message)]
pub struct ChannelPoint {
    #[prost(uint32, tag = "3")]
    pub output_index: u32,
    #[prost(oneof = "channel_point::FundingTxid", tags = "1, 2")]
    pub funding_txid: Option<channel_point::FundingTxid>,
}

pub mod channel_point {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum FundingTxid {
        /// Raw txid bytes in internal byte order.
        #[prost(bytes, tag = "1")]
        FundingTxidBytes(Vec<u8>),
        /// Txid hex in display (reversed) byte order.
        #[prost(string, tag = "2")]
        FundingTxidStr(String),
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct ChannelEdgeUpdate {
    #[prost(uint64, tag = "1")]
    pub chan_id: u64,
    #[prost(message, optional, tag = "2")]
    pub chan_point: Option<ChannelPoint>,
    #[prost(int64, tag = "3")]
    pub capacity: i64,
    #[prost(string, tag = "5")]
    pub advertising_node: String,
    #[prost(string, tag = "6")]
    pub connecting_node: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct ClosedChannelUpdate {
    #[prost(uint64, tag = "1")]
    pub chan_id: u64,
    #[prost(int64, tag = "2")]
    pub capacity: i64,
    #[prost(uint32, tag = "3")]
    pub closed_height: u32,
    #[prost(message, optional, tag = "4")]
    pub chan_point: Option<ChannelPoint>,
}

#[derive(Clone, PartialEq, Message)]
pub struct GraphTopologyUpdate {
    #[prost(message, repeated, tag = "2")]
    pub channel_updates: Vec<ChannelEdgeUpdate>,
    #[prost(message, repeated, tag = "3")]
    pub closed_chans: Vec<ClosedChannelUpdate>,
}

#[derive(Clone, PartialEq, Message)]
pub struct WalletBalanceRequest {}

#[derive(Clone, PartialEq, Message)]
pub struct WalletBalanceResponse {
    #[prost(int64, tag = "1")]
    pub total_balance: i64,
    #[prost(int64, tag = "2")]
    pub confirmed_balance: i64,
    #[prost(int64, tag = "3")]
    pub unconfirmed_balance: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct StopRequest {}

#[derive(Clone, PartialEq, Message)]
pub struct StopResponse {}

// === lnrpc.State ===

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum WalletState {
    NonExisting = 0,
    Locked = 1,
    Unlocked = 2,
    RpcActive = 3,
    ServerActive = 4,
    WaitingToStart = 255,
}

impl WalletState {
    /// Decodes the raw wire value; `None` for values this build does not know.
    pub fn from_wire(value: i32) -> Option<Self> {
        Self::try_from(value).ok()
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct SubscribeStateRequest {}

#[derive(Clone, PartialEq, Message)]
pub struct SubscribeStateResponse {
    #[prost(enumeration = "WalletState", tag = "1")]
    pub state: i32,
}

// === lnrpc.WalletUnlocker ===

#[derive(Clone, PartialEq, Message)]
pub struct GenSeedRequest {
    #[prost(bytes, tag = "1")]
    pub aezeed_passphrase: Vec<u8>,
    #[prost(bytes, tag = "2")]
    pub seed_entropy: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct GenSeedResponse {
    #[prost(string, repeated, tag = "1")]
    pub cipher_seed_mnemonic: Vec<String>,
    #[prost(bytes, tag = "2")]
    pub enciphered_seed: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct InitWalletRequest {
    #[prost(bytes, tag = "1")]
    pub wallet_password: Vec<u8>,
    #[prost(string, repeated, tag = "2")]
    pub cipher_seed_mnemonic: Vec<String>,
    #[prost(bytes, tag = "3")]
    pub aezeed_passphrase: Vec<u8>,
    #[prost(int32, tag = "4")]
    pub recovery_window: i32,
    #[prost(bool, tag = "6")]
    pub stateless_init: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct InitWalletResponse {
    #[prost(bytes, tag = "1")]
    pub admin_macaroon: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct UnlockWalletRequest {
    #[prost(bytes, tag = "1")]
    pub wallet_password: Vec<u8>,
    #[prost(int32, tag = "2")]
    pub recovery_window: i32,
    #[prost(bool, tag = "4")]
    pub stateless_init: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct UnlockWalletResponse {}

#[derive(Clone, PartialEq, Message)]
pub struct ChangePasswordRequest {
    #[prost(bytes, tag = "1")]
    pub current_password: Vec<u8>,
    #[prost(bytes, tag = "2")]
    pub new_password: Vec<u8>,
    #[prost(bool, tag = "3")]
    pub stateless_init: bool,
    #[prost(bool, tag = "4")]
    pub new_macaroon_root_key: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct ChangePasswordResponse {
    #[prost(bytes, tag = "1")]
    pub admin_macaroon: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_state_wire_values() {
        assert_eq!(WalletState::from_wire(255), Some(WalletState::WaitingToStart));
        assert_eq!(WalletState::from_wire(4), Some(WalletState::ServerActive));
        assert_eq!(WalletState::from_wire(42), None);
    }

    #[test]
    fn test_state_response_decodes_from_daemon_bytes() {
        // field 1, varint 255
        let bytes = [0x08, 0xff, 0x01];
        let resp = SubscribeStateResponse::decode(&bytes[..]).unwrap();
        assert_eq!(resp.state, 255);
    }
}
