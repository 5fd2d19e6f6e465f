//! Positional decoders for HLZ headers and bodies
//!
//! Every layout is a compile-time table of field names. A decoder consumes
//! exactly as many tokens as its table lists, in order, and assigns them by
//! position. Decoders check field count only; whether a token is a valid date
//! or number is decided by [`crate::io::mapping`].
//!
//! # Layouts
//!
//! | Kind | Version | Tokens |
//! |---|---|---|
//! | header | any | 7 |
//! | transactions | 016 | 25 (field 11 = port zero) |
//! | transactions | 017 | 25 (field 11 = metal counter) |
//! | bags | 001 | 5 |
//! | label-orders | 001 | 5 |

use crate::io::tokenizer::TokenCursor;
use crate::types::{
    ArtifactKind, BagBody, BatchBody, BatchCounter, BodyRecord, DecodedBody, HeaderRecord,
    ImportError, LabelOrderBody,
};

pub const HEADER_FIELDS: [&str; 7] = [
    "fortRunningNumber",
    "identifierOfMessageType",
    "messageVersionNumber",
    "dateOfCreation",
    "glnFirstDistributor",
    "glnServiceProvider",
    "constant",
];

pub const BATCH_V016_FIELDS: [&str; 25] = [
    "batchId",
    "referenceNumber",
    "user",
    "batchTimeStart",
    "numberOfRefundable",
    "numberOfRefundableFromNoReadTable",
    "numberOfNonRefundable",
    "numberOfNonRefundableFromNoReadTable",
    "eanNotReadable",
    "unknown",
    "portZero",
    "numberInBatch",
    "numberInShift",
    "batchTimeEnd",
    "firstBlankReservedField",
    "batchTime",
    "keyId",
    "ankerAndersenILNNumber",
    "pricatVersion",
    "trashCodes",
    "secondBlankReservedField",
    "thirdBlankReservedField",
    "fourthBlankReservedField",
    "totalDepositAmount",
    "reserved",
];

pub const BATCH_V017_FIELDS: [&str; 25] = [
    "batchId",
    "referenceNumber",
    "user",
    "batchTimeStart",
    "numberOfRefundable",
    "numberOfRefundableFromNoReadTable",
    "numberOfNonRefundable",
    "numberOfNonRefundableFromNoReadTable",
    "eanNotReadable",
    "unknown",
    "metalCounter",
    "numberInBatch",
    "numberInShift",
    "batchTimeEnd",
    "firstBlankReservedField",
    "batchTime",
    "keyId",
    "ankerAndersenILNNumber",
    "pricatVersion",
    "trashCodes",
    "secondBlankReservedField",
    "thirdBlankReservedField",
    "fourthBlankReservedField",
    "totalDepositAmount",
    "reserved",
];

pub const BAG_V001_FIELDS: [&str; 5] = [
    "customerNumber",
    "labelNumber",
    "registeredAt",
    "numberOfContainers",
    "depositAmount",
];

pub const LABEL_ORDER_V001_FIELDS: [&str; 5] = [
    "customerNumber",
    "ownerNumber",
    "firstLabel",
    "lastLabel",
    "orderedAt",
];

/// Body layout for one (artifact kind, schema version) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLayout {
    BatchV016,
    BatchV017,
    BagV001,
    LabelOrderV001,
}

impl BodyLayout {
    /// Registered layouts and the version token selecting them
    pub const REGISTRY: [(ArtifactKind, &'static str, BodyLayout); 4] = [
        (ArtifactKind::Transactions, "016", BodyLayout::BatchV016),
        (ArtifactKind::Transactions, "017", BodyLayout::BatchV017),
        (ArtifactKind::Bags, "001", BodyLayout::BagV001),
        (ArtifactKind::LabelOrders, "001", BodyLayout::LabelOrderV001),
    ];

    /// Select the layout for a declared version
    ///
    /// # Errors
    ///
    /// `UnsupportedVersion` when no layout is registered for the pair.
    pub fn lookup(kind: ArtifactKind, version: &str) -> Result<Self, ImportError> {
        Self::REGISTRY
            .iter()
            .find(|(k, v, _)| *k == kind && *v == version)
            .map(|(_, _, layout)| *layout)
            .ok_or_else(|| ImportError::unsupported_version(kind, version))
    }

    pub fn kind(self) -> ArtifactKind {
        match self {
            BodyLayout::BatchV016 | BodyLayout::BatchV017 => ArtifactKind::Transactions,
            BodyLayout::BagV001 => ArtifactKind::Bags,
            BodyLayout::LabelOrderV001 => ArtifactKind::LabelOrders,
        }
    }

    pub fn fields(self) -> &'static [&'static str] {
        match self {
            BodyLayout::BatchV016 => &BATCH_V016_FIELDS,
            BodyLayout::BatchV017 => &BATCH_V017_FIELDS,
            BodyLayout::BagV001 => &BAG_V001_FIELDS,
            BodyLayout::LabelOrderV001 => &LABEL_ORDER_V001_FIELDS,
        }
    }

    /// Decode one body at the cursor
    pub fn decode(self, cursor: &mut TokenCursor) -> Result<DecodedBody, ImportError> {
        let line = cursor.line();
        let record = match self {
            BodyLayout::BatchV016 => {
                BodyRecord::Batch(decode_batch(cursor, &BATCH_V016_FIELDS, BatchCounter::PortZero)?)
            }
            BodyLayout::BatchV017 => BodyRecord::Batch(decode_batch(
                cursor,
                &BATCH_V017_FIELDS,
                BatchCounter::MetalCounter,
            )?),
            BodyLayout::BagV001 => {
                let [
                    customer_number,
                    label_number,
                    registered_at,
                    number_of_containers,
                    deposit_amount,
                ] = take(cursor, &BAG_V001_FIELDS)?;
                BodyRecord::Bag(BagBody {
                    customer_number,
                    label_number,
                    registered_at,
                    number_of_containers,
                    deposit_amount,
                })
            }
            BodyLayout::LabelOrderV001 => {
                let [customer_number, owner_number, first_label, last_label, ordered_at] =
                    take(cursor, &LABEL_ORDER_V001_FIELDS)?;
                BodyRecord::LabelOrder(LabelOrderBody {
                    customer_number,
                    owner_number,
                    first_label,
                    last_label,
                    ordered_at,
                })
            }
        };

        Ok(DecodedBody {
            kind: self.kind(),
            line,
            record,
        })
    }
}

/// Read `N` tokens named by `fields`
fn take<const N: usize>(
    cursor: &mut TokenCursor,
    fields: &[&'static str; N],
) -> Result<[String; N], ImportError> {
    let mut values: [String; N] = std::array::from_fn(|_| String::new());
    for (slot, field) in values.iter_mut().zip(fields.iter()) {
        *slot = cursor.next_token(field)?;
    }
    Ok(values)
}

fn decode_batch(
    cursor: &mut TokenCursor,
    fields: &[&'static str; 25],
    counter: fn(String) -> BatchCounter,
) -> Result<BatchBody, ImportError> {
    let [
        batch_id,
        reference_number,
        user,
        batch_time_start,
        number_of_refundable,
        number_of_refundable_from_no_read_table,
        number_of_non_refundable,
        number_of_non_refundable_from_no_read_table,
        ean_not_readable,
        unknown,
        counter_value,
        number_in_batch,
        number_in_shift,
        batch_time_end,
        first_blank_reserved_field,
        batch_time,
        key_id,
        anker_andersen_iln_number,
        pricat_version,
        trash_codes,
        second_blank_reserved_field,
        third_blank_reserved_field,
        fourth_blank_reserved_field,
        total_deposit_amount,
        reserved,
    ] = take(cursor, fields)?;

    Ok(BatchBody {
        batch_id,
        reference_number,
        user,
        batch_time_start,
        number_of_refundable,
        number_of_refundable_from_no_read_table,
        number_of_non_refundable,
        number_of_non_refundable_from_no_read_table,
        ean_not_readable,
        unknown,
        counter: counter(counter_value),
        number_in_batch,
        number_in_shift,
        batch_time_end,
        first_blank_reserved_field,
        batch_time,
        key_id,
        anker_andersen_iln_number,
        pricat_version,
        trash_codes,
        second_blank_reserved_field,
        third_blank_reserved_field,
        fourth_blank_reserved_field,
        total_deposit_amount,
        reserved,
    })
}

/// Decode the 7-token header at the start of a file
pub fn decode_header(
    cursor: &mut TokenCursor,
    kind: ArtifactKind,
) -> Result<HeaderRecord, ImportError> {
    let line = cursor.line();
    let [
        fort_running_number,
        identifier_of_message_type,
        message_version_number,
        date_of_creation,
        gln_first_distributor,
        gln_service_provider,
        constant,
    ] = take(cursor, &HEADER_FIELDS)?;

    Ok(HeaderRecord {
        fort_running_number,
        identifier_of_message_type,
        message_version_number,
        date_of_creation,
        gln_first_distributor,
        gln_service_provider,
        constant,
        kind,
        line,
    })
}

/// Decode bodies until the input is exhausted
///
/// Returns an empty vector when the header was the whole file; a trailing
/// partial body fails with `TruncatedRecord`.
pub fn decode_bodies(
    cursor: &mut TokenCursor,
    layout: BodyLayout,
) -> Result<Vec<DecodedBody>, ImportError> {
    let mut bodies = Vec::with_capacity(cursor.remaining() / layout.fields().len());
    while !cursor.is_exhausted() {
        bodies.push(layout.decode(cursor)?);
    }
    Ok(bodies)
}
