//! Interface of the multi-party account being guarded.

use crate::types::Transaction;

/// The account that actually carries out calls.
///
/// Signature collection, nonces and the owner threshold live on the other
/// side of this trait. Both entry points report only success or failure.
pub trait SafeAccount {
    /// Execute on behalf of an enabled module (the governor's path).
    fn execute_from_module(&mut self, tx: &Transaction) -> bool;

    /// Execute a call the owners signed directly.
    fn execute(&mut self, tx: &Transaction) -> bool;
}

impl<A: SafeAccount + ?Sized> SafeAccount for &mut A {
    fn execute_from_module(&mut self, tx: &Transaction) -> bool {
        (**self).execute_from_module(tx)
    }

    fn execute(&mut self, tx: &Transaction) -> bool {
        (**self).execute(tx)
    }
}

impl<A: SafeAccount + ?Sized> SafeAccount for Box<A> {
    fn execute_from_module(&mut self, tx: &Transaction) -> bool {
        (**self).execute_from_module(tx)
    }

    fn execute(&mut self, tx: &Transaction) -> bool {
        (**self).execute(tx)
    }
}
