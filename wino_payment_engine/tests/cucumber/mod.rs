mod fake_ledger;
mod invoice_world;
mod steps;

pub use fake_ledger::FakeLedger;
pub use invoice_world::InvoiceWorld;
