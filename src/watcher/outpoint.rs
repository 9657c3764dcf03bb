//! Channel-point decoding.
//!
//! A channel point arrives either as raw txid bytes (internal byte order) or as a hex
//! string (display order); both normalise to a [`bitcoin::OutPoint`], whose `Display`
//! (`txid:vout`) is also the form the graph snapshot uses.
//!
//! Caller requests are decoded strictly. Topology updates are decoded leniently: a bad
//! item is reported and skipped, the rest of the update still applies.

use std::str::FromStr;

use bitcoin::hashes::Hash;
use bitcoin::{OutPoint, Txid};
use thiserror::Error;

use crate::rpc::proto::{self, channel_point::FundingTxid};

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutpointError {
    #[error("channel point has no funding txid")]
    MissingTxid,

    #[error("funding txid must be 32 bytes, got {0}")]
    BadLength(usize),

    #[error("funding txid {0:?} is not valid hex")]
    BadHex(String),

    #[error("update carries no channel point")]
    MissingChannelPoint,
}

/// Decodes a channel point, rejecting anything malformed.
pub fn decode_channel_point(cp: &proto::ChannelPoint) -> Result<OutPoint, OutpointError> {
    let txid = match &cp.funding_txid {
        Some(FundingTxid::FundingTxidBytes(bytes)) => {
            let raw: [u8; 32] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| OutpointError::BadLength(bytes.len()))?;
            Txid::from_byte_array(raw)
        }
        Some(FundingTxid::FundingTxidStr(s)) => {
            Txid::from_str(s).map_err(|_| OutpointError::BadHex(s.clone()))?
        }
        None => return Err(OutpointError::MissingTxid),
    };
    Ok(OutPoint::new(txid, cp.output_index))
}

/// Encodes an outpoint in the bytes form.
pub fn channel_point(outpoint: &OutPoint) -> proto::ChannelPoint {
    proto::ChannelPoint {
        output_index: outpoint.vout,
        funding_txid: Some(FundingTxid::FundingTxidBytes(
            outpoint.txid.to_byte_array().to_vec(),
        )),
    }
}

/// Outpoints named by one topology update, in delivery order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TopologyUpdate {
    /// One entry per edge announcement (each direction announces separately).
    pub announced: Vec<OutPoint>,
    pub closed: Vec<OutPoint>,
}

impl TopologyUpdate {
    pub fn is_empty(&self) -> bool {
        self.announced.is_empty() && self.closed.is_empty()
    }
}

/// Decodes every item it can; returns the errors for the ones it skipped.
pub fn decode_update(update: &proto::GraphTopologyUpdate) -> (TopologyUpdate, Vec<OutpointError>) {
    let mut out = TopologyUpdate::default();
    let mut skipped = Vec::new();

    let mut decode = |cp: Option<&proto::ChannelPoint>| {
        cp.ok_or(OutpointError::MissingChannelPoint)
            .and_then(decode_channel_point)
            .map_err(|err| skipped.push(err))
            .ok()
    };

    for edge in &update.channel_updates {
        if let Some(op) = decode(edge.chan_point.as_ref()) {
            out.announced.push(op);
        }
    }
    for closed in &update.closed_chans {
        if let Some(op) = decode(closed.chan_point.as_ref()) {
            out.closed.push(op);
        }
    }
    (out, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TXID: &str = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";

    fn op(vout: u32) -> OutPoint {
        OutPoint::new(Txid::from_str(TXID).unwrap(), vout)
    }

    #[test]
    fn test_bytes_and_string_forms_agree() {
        let from_bytes = decode_channel_point(&channel_point(&op(1))).unwrap();
        let from_str = decode_channel_point(&proto::ChannelPoint {
            output_index: 1,
            funding_txid: Some(FundingTxid::FundingTxidStr(TXID.to_string())),
        })
        .unwrap();
        assert_eq!(from_bytes, from_str);
        assert_eq!(from_bytes.to_string(), format!("{TXID}:1"));
    }

    #[test]
    fn test_strict_decoding_rejects_bad_input() {
        let short = proto::ChannelPoint {
            output_index: 0,
            funding_txid: Some(FundingTxid::FundingTxidBytes(vec![1, 2, 3])),
        };
        assert_eq!(decode_channel_point(&short), Err(OutpointError::BadLength(3)));

        let bad_hex = proto::ChannelPoint {
            output_index: 0,
            funding_txid: Some(FundingTxid::FundingTxidStr("zz".into())),
        };
        assert!(matches!(decode_channel_point(&bad_hex), Err(OutpointError::BadHex(_))));

        let empty = proto::ChannelPoint {
            output_index: 0,
            funding_txid: None,
        };
        assert_eq!(decode_channel_point(&empty), Err(OutpointError::MissingTxid));
    }

    #[test]
    fn test_lenient_update_skips_bad_items() {
        let update = proto::GraphTopologyUpdate {
            channel_updates: vec![
                proto::ChannelEdgeUpdate {
                    chan_point: Some(channel_point(&op(0))),
                    ..Default::default()
                },
                proto::ChannelEdgeUpdate {
                    chan_point: None,
                    ..Default::default()
                },
                proto::ChannelEdgeUpdate {
                    chan_point: Some(channel_point(&op(0))),
                    ..Default::default()
                },
            ],
            closed_chans: vec![proto::ClosedChannelUpdate {
                chan_point: Some(proto::ChannelPoint {
                    output_index: 2,
                    funding_txid: Some(FundingTxid::FundingTxidBytes(vec![0; 31])),
                }),
                ..Default::default()
            }],
        };

        let (decoded, skipped) = decode_update(&update);
        assert_eq!(decoded.announced, vec![op(0), op(0)]);
        assert!(decoded.closed.is_empty());
        assert_eq!(
            skipped,
            vec![OutpointError::MissingChannelPoint, OutpointError::BadLength(31)]
        );
    }
}
