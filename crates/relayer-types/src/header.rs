use core::fmt::Debug;

use ibc_proto::google::protobuf::Any;

use crate::height::Height;

/// Abstract consensus-state update information produced by a prover.
///
/// The relay engine never looks inside a header; it orders headers by
/// height and forwards them, protobuf-packed, into update-client
/// messages. Concrete header types live with the light-client
/// implementations behind the prover capability.
pub trait Header: Debug + Send + Sync {
    /// The height this header attests to.
    fn height(&self) -> Height;

    /// Protobuf packing suitable for embedding in a client message.
    fn to_any(&self) -> Any;
}
