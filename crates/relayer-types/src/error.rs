use flex_error::define_error;

use crate::signer::SignerError;

define_error! {
    #[derive(Debug, PartialEq, Eq)]
    ValidationError {
        InvalidLength
            {
                id: String,
                length: usize,
                min: usize,
                max: usize,
            }
            |e| {
                format!("identifier `{}` has invalid length {}, must be between {} and {} characters",
                    e.id, e.length, e.min, e.max)
            },

        InvalidCharacter
            { id: String }
            |e| { format!("identifier `{}` contains a character outside of the allowed set", e.id) },

        UnknownOrdering
            { ordering: String }
            |e| { format!("unknown channel ordering `{}`", e.ordering) },

        EmptyProof
            |_| { "proof cannot be empty" },

        MissingPacket
            |_| { "raw message carries no packet" },

        MissingProofHeight
            |_| { "raw message carries no proof height" },

        MissingHeader
            |_| { "raw message carries no header" },

        Signer
            [ SignerError ]
            |_| { "invalid signer address" },
    }
}
