//! Domain mapping from decoded string fields to settled records
//!
//! Decoders keep every field as a string so a bad legacy value cannot abort
//! decoding. This module coerces those strings into counts, timestamps and
//! amounts. Every unparseable field of a body is reported, not just the first.
//!
//! # Field formats
//!
//! - timestamps: `YYYYMMDDhhmmss`
//! - header creation date: `YYYYMMDD`
//! - counts and label numbers: unsigned decimal integers
//! - amounts: integer cents, or a decimal with a `.` separator

use crate::types::{
    BodyRecord, DecodedBody, HeaderRecord, ImportError, SettledBag, SettledBatch,
    SettledLabelOrder, SettledRecord,
};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::str::FromStr;

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const DATE_FORMAT: &str = "%Y%m%d";

/// Owner number meaning "not scoped to an owner"
const NO_OWNER: &str = "0";

/// Collects coercion errors for one body
#[derive(Debug, Default)]
struct FieldErrors(Vec<ImportError>);

impl FieldErrors {
    fn count(&mut self, field: &str, value: &str) -> u32 {
        value.parse::<u32>().unwrap_or_else(|_| {
            self.0
                .push(ImportError::invalid_field(field, value, "not an unsigned number"));
            0
        })
    }

    fn label(&mut self, field: &str, value: &str) -> u64 {
        value.parse::<u64>().unwrap_or_else(|_| {
            self.0
                .push(ImportError::invalid_field(field, value, "not a label number"));
            0
        })
    }

    fn timestamp(&mut self, field: &str, value: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).unwrap_or_else(|_| {
            self.0.push(ImportError::invalid_field(
                field,
                value,
                "expected YYYYMMDDhhmmss",
            ));
            NaiveDateTime::default()
        })
    }

    fn amount(&mut self, field: &str, value: &str) -> Decimal {
        parse_amount(value).unwrap_or_else(|| {
            self.0
                .push(ImportError::invalid_field(field, value, "not an amount"));
            Decimal::ZERO
        })
    }

    fn finish<T>(self, value: T) -> Result<T, Vec<ImportError>> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(self.0)
        }
    }
}

fn parse_amount(value: &str) -> Option<Decimal> {
    if value.contains('.') {
        Decimal::from_str(value).ok()
    } else {
        value.parse::<i64>().ok().map(|cents| Decimal::new(cents, 2))
    }
}

/// Parse the header creation date
pub fn header_date(header: &HeaderRecord) -> Result<NaiveDateTime, ImportError> {
    NaiveDate::parse_from_str(&header.date_of_creation, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| {
            ImportError::invalid_field(
                "dateOfCreation",
                &header.date_of_creation,
                "expected YYYYMMDD",
            )
        })
}

/// Map one decoded body onto its settled record
///
/// # Errors
///
/// Every field that fails coercion, as `InvalidField` errors.
pub fn map_body(
    company: &str,
    header: &HeaderRecord,
    file_created_at: NaiveDateTime,
    body: &DecodedBody,
) -> Result<SettledRecord, Vec<ImportError>> {
    let mut errors = FieldErrors::default();

    match &body.record {
        BodyRecord::Batch(b) => {
            let refundable = errors.count("numberOfRefundable", &b.number_of_refundable);
            let refundable_no_read = errors.count(
                "numberOfRefundableFromNoReadTable",
                &b.number_of_refundable_from_no_read_table,
            );
            let non_refundable = errors.count("numberOfNonRefundable", &b.number_of_non_refundable);
            let non_refundable_no_read = errors.count(
                "numberOfNonRefundableFromNoReadTable",
                &b.number_of_non_refundable_from_no_read_table,
            );
            let batch = SettledBatch {
                owner: header.gln_service_provider.clone(),
                company: company.to_string(),
                batch_id: b.batch_id.clone(),
                reference_number: b.reference_number.clone(),
                user: b.user.clone(),
                started_at: errors.timestamp("batchTimeStart", &b.batch_time_start),
                ended_at: errors.timestamp("batchTimeEnd", &b.batch_time_end),
                refundable: refundable.saturating_add(refundable_no_read),
                non_refundable: non_refundable.saturating_add(non_refundable_no_read),
                ean_not_readable: errors.count("eanNotReadable", &b.ean_not_readable),
                counter: errors.count("portZero/metalCounter", b.counter.value()),
                number_in_batch: errors.count("numberInBatch", &b.number_in_batch),
                number_in_shift: errors.count("numberInShift", &b.number_in_shift),
                key_id: b.key_id.clone(),
                pricat_version: b.pricat_version.clone(),
                total_deposit_amount: errors.amount("totalDepositAmount", &b.total_deposit_amount),
                file_created_at,
            };
            errors.finish(SettledRecord::Batch(batch))
        }
        BodyRecord::Bag(b) => {
            let bag = SettledBag {
                company: company.to_string(),
                customer_number: b.customer_number.clone(),
                label_number: b.label_number.clone(),
                registered_at: errors.timestamp("registeredAt", &b.registered_at),
                number_of_containers: errors.count("numberOfContainers", &b.number_of_containers),
                deposit_amount: errors.amount("depositAmount", &b.deposit_amount),
            };
            errors.finish(SettledRecord::Bag(bag))
        }
        BodyRecord::LabelOrder(o) => {
            let first_label = errors.label("firstLabel", &o.first_label);
            let last_label = errors.label("lastLabel", &o.last_label);
            if errors.0.is_empty() && last_label < first_label {
                errors.0.push(ImportError::invalid_field(
                    "lastLabel",
                    &o.last_label,
                    format!("precedes first label {}", first_label),
                ));
            }
            let order = SettledLabelOrder {
                company: company.to_string(),
                customer_number: o.customer_number.clone(),
                owner_number: (o.owner_number != NO_OWNER).then(|| o.owner_number.clone()),
                first_label,
                last_label,
                ordered_at: errors.timestamp("orderedAt", &o.ordered_at),
            };
            errors.finish(SettledRecord::LabelOrder(order))
        }
    }
}
