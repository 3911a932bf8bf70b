//! Ansible provisioner for scenario-driven role testing.
//!
//! A scenario file describes platforms and provisioner settings; the
//! [`provisioner::Ansible`] type turns it into an `ansible.cfg`, an
//! inventory directory and `ansible-playbook` invocations.

pub mod cli;
pub mod config;
pub mod error;
pub mod inventory;
pub mod playbook;
pub mod provisioner;
pub mod testing;
pub mod util;

pub use error::{ProvisionerError, Result};
