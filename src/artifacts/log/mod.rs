//! Commit history traversal
//!
//! - `rev_walk`: a pull-based walker over commits reachable from pushed tips and
//!   not reachable from hidden ones
//!
//! ## Ordering
//!
//! Without sorting flags commits come out in discovery order. `TIME` uses a
//! priority queue keyed on committer time, `TOPOLOGICAL` never emits a parent
//! before its children, and `REVERSE` flips whichever order was chosen.

pub mod rev_walk;
