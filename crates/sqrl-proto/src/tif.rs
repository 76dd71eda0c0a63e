//! Transaction Information Flags.
//!
//! Every `/cli.sqrl` response carries a `tif=` field: a bitfield the client
//! reads to learn what the server concluded about the request. Errors are
//! never HTTP errors on this endpoint; they are TIF bits.

use bitflags::bitflags;

bitflags! {
    /// The TIF bitfield, rendered as uppercase hex on the wire.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Tif: u32 {
        /// The request's `idk` matched a known identity.
        const ID_MATCH = 0x01;
        /// The request's `pidk` matched a known identity.
        const PREVIOUS_ID_MATCH = 0x02;
        /// The request arrived from the IP the nut was issued to.
        const IP_MATCH = 0x04;
        /// The identity exists but is disabled for SQRL authentication.
        const SQRL_DISABLED = 0x08;
        /// The command is not one this server supports.
        const FUNCTION_NOT_SUPPORTED = 0x10;
        /// A server-side store failure; the client may retry.
        const TRANSIENT_ERROR = 0x20;
        /// The requested mutation was refused.
        const COMMAND_FAILED = 0x40;
        /// The request itself was invalid (parse or signature failure).
        const CLIENT_FAILURE = 0x80;
        /// The request's identity does not belong to this session.
        const BAD_ID_ASSOCIATION = 0x100;
        /// The identity has been rekeyed; only `query` is permitted.
        const IDENTITY_SUPERSEDED = 0x200;
    }
}

impl Tif {
    /// Wire rendering: uppercase hex, no prefix, no leading zeros.
    pub fn as_hex(self) -> String {
        format!("{:X}", self.bits())
    }
}
