// SPDX-License-Identifier: MIT

//! Session identifier.
//!
//! Opaque to the daemon: it is whatever `SessionManager` hands back from
//! `start_session`/`resume_session`, stored in task metadata purely so a
//! later `resume_session` call can be attempted.

crate::define_id! {
    pub struct SessionId;
}
