//! Unit of work
//!
//! An action runs against a working copy of the book. The copy replaces the
//! book only when the action returns `Ok`; on `Err` it is dropped, so a
//! failed action leaves no entries, flags or links behind. Blocking
//! directives are handed back to the caller to apply after commit.

use tracing::debug;

use crate::blocking::BlockingDirective;
use crate::book::PaymentBook;
use crate::error::PaymentError;

pub struct UnitOfWork {
    book: PaymentBook,
    directives: Vec<BlockingDirective>,
}

impl UnitOfWork {
    fn begin(book: &PaymentBook) -> Self {
        Self {
            book: book.clone(),
            directives: Vec::new(),
        }
    }

    /// Runs `action` and commits its changes to `book` on success
    pub fn run<T>(
        book: &mut PaymentBook,
        action: impl FnOnce(&mut UnitOfWork) -> Result<T, PaymentError>,
    ) -> Result<(T, Vec<BlockingDirective>), PaymentError> {
        let mut uow = Self::begin(book);
        match action(&mut uow) {
            Ok(value) => {
                *book = uow.book;
                Ok((value, uow.directives))
            }
            Err(err) => {
                debug!(error = %err, "Unit of work rolled back");
                Err(err)
            }
        }
    }

    pub fn book(&self) -> &PaymentBook {
        &self.book
    }

    pub fn book_mut(&mut self) -> &mut PaymentBook {
        &mut self.book
    }

    /// Queues a blocking side effect for after commit
    pub fn defer(&mut self, directive: BlockingDirective) {
        self.directives.push(directive);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{Currency, PartyId};
    use domain_ledger::{Account, AccountType, Ledger};

    fn book() -> PaymentBook {
        PaymentBook::new(Ledger::new(Currency::MAD))
    }

    #[test]
    fn test_error_discards_working_copy() {
        let mut book = book();
        let account = core_kernel::AccountId::new();
        let result: Result<((), _), _> = UnitOfWork::run(&mut book, |uow| {
            uow.book_mut()
                .ledger_mut()
                .add_account(Account::new(account, "5141", "Bank", AccountType::Asset))?;
            uow.defer(BlockingDirective::Block {
                partner: PartyId::new(),
                reason: "test".into(),
            });
            Err(PaymentError::validation("abort"))
        });

        assert!(result.is_err());
        assert!(book.ledger().account(&account).is_none());
    }

    #[test]
    fn test_ok_commits_and_returns_directives() {
        let mut book = book();
        let account = core_kernel::AccountId::new();
        let (value, directives) = UnitOfWork::run(&mut book, |uow| {
            uow.book_mut()
                .ledger_mut()
                .add_account(Account::new(account, "5141", "Bank", AccountType::Asset))?;
            uow.defer(BlockingDirective::Unblock {
                partner: PartyId::new(),
                reason: "test".into(),
            });
            Ok(7)
        })
        .unwrap();

        assert_eq!(value, 7);
        assert_eq!(directives.len(), 1);
        assert!(book.ledger().account(&account).is_some());
    }
}
