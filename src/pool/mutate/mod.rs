//! Module dedicated to the mutation coordinator.
//!
//! Every mutation is optimistic-with-reconciliation: the local
//! stores are patched immediately so the UI reflects the change with
//! zero latency, the corresponding remote call is issued, and on
//! failure the local state is discarded by re-fetching ground truth
//! (never by replaying an inverse operation).

mod clear;
mod create;
mod move_;
mod remove;
mod restore;
mod update;
