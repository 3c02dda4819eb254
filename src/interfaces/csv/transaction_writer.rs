use crate::config::ReportTimezone;
use crate::domain::transaction::{Transaction, TransactionId};
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

const HEADER: [&str; 9] = [
    "id",
    "port",
    "price",
    "status",
    "ref_id",
    "tracking_code",
    "card_number",
    "payment_date",
    "created_at",
];

#[derive(Serialize)]
struct Row<'a> {
    id: TransactionId,
    port: &'static str,
    price: Decimal,
    status: &'static str,
    ref_id: Option<&'a str>,
    tracking_code: Option<&'a str>,
    card_number: Option<&'a str>,
    payment_date: Option<String>,
    created_at: String,
}

/// Writes a transaction report as CSV.
///
/// The header is written up front so an empty store still produces a valid
/// report. Timestamps are rendered in the configured zone.
pub struct TransactionWriter<W: Write> {
    writer: csv::Writer<W>,
    timezone: ReportTimezone,
}

impl<W: Write> TransactionWriter<W> {
    pub fn new(sink: W, timezone: ReportTimezone) -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(sink);
        Self { writer, timezone }
    }

    pub fn write_transactions<I>(&mut self, transactions: I) -> Result<()>
    where
        I: IntoIterator<Item = Transaction>,
    {
        self.writer.write_record(HEADER)?;
        for tx in transactions {
            self.writer.serialize(Row {
                id: tx.id,
                port: tx.port.name(),
                price: tx.price.normalize(),
                status: tx.status.as_str(),
                ref_id: tx.ref_id.as_deref(),
                tracking_code: tx.tracking_code.as_deref(),
                card_number: tx.card_number.as_deref(),
                payment_date: tx.payment_date.map(|date| self.timezone.format(date)),
                created_at: self.timezone.format(tx.created_at),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::gateway::Gateway;
    use crate::domain::transaction::{Completion, NewTransaction, TransactionStatus};
    use chrono::{FixedOffset, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn transaction() -> Transaction {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        let mut tx = Transaction::from_new(
            7,
            NewTransaction {
                port: Gateway::Zarinpal,
                price: dec!(1500.00),
                description: None,
                ip: None,
            },
            created,
        );
        tx.set_ref_id("A0001", created).unwrap();
        tx.complete(
            TransactionStatus::Pending,
            Completion::succeeded(Some("201".into()), Some("6037991234567890")),
            created,
        )
        .unwrap();
        tx
    }

    fn render(transactions: Vec<Transaction>, timezone: ReportTimezone) -> String {
        let mut out = Vec::new();
        TransactionWriter::new(&mut out, timezone)
            .write_transactions(transactions)
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_empty_report_has_header() {
        let out = render(vec![], ReportTimezone::Fixed(FixedOffset::east_opt(0).unwrap()));
        assert_eq!(
            out,
            "id,port,price,status,ref_id,tracking_code,card_number,payment_date,created_at\n"
        );
    }

    #[test]
    fn test_row_uses_configured_offset() {
        let tehran = ReportTimezone::Fixed(FixedOffset::east_opt(3 * 3600 + 1800).unwrap());
        let out = render(vec![transaction()], tehran);
        let row = out.lines().nth(1).unwrap();
        assert_eq!(
            row,
            "7,ZARINPAL,1500,succeeded,A0001,201,603799******7890,2024-03-01T12:00:00+03:30,2024-03-01T12:00:00+03:30"
        );
    }

    #[test]
    fn test_row_uses_named_zone() {
        let out = render(vec![transaction()], "Asia/Tehran".parse().unwrap());
        assert!(out.lines().nth(1).unwrap().ends_with(
            "2024-03-01T12:00:00+03:30,2024-03-01T12:00:00+03:30"
        ));
    }
}
