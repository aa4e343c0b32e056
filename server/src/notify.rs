/*
 * This file is part of digsd, the control-plane daemon for a wide-area
 * replicated data grid.
 *
 * Copyright (c) 2026, DiGS control plane contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! Operator alerting. The grid notifies a human on disk-space panics, three
//! consecutive ping failures on a host, and checksum mismatches. Message delivery
//! itself is out of scope here; we only own the point where a sweep decides
//! something is alert-worthy

/// A sink that an operator notification is handed to. The only implementation shipped
/// here logs the alert; a real deployment would swap in one that actually sends mail
pub trait NotifySink: Send + Sync {
    fn notify(&self, address: &str, subject: &str, body: &str);
}

/// Logs the alert at `warn!` instead of delivering it anywhere. This keeps the control
/// thread's alerting path exercised by every test without requiring a mail relay
pub struct LogNotifier;

impl NotifySink for LogNotifier {
    fn notify(&self, address: &str, subject: &str, body: &str) {
        log::warn!("operator notification to {address}: {subject}\n{body}");
    }
}

#[cfg(test)]
pub mod test_util {
    use super::NotifySink;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<(String, String, String)>>,
    }

    impl NotifySink for RecordingNotifier {
        fn notify(&self, address: &str, subject: &str, body: &str) {
            self.sent
                .lock()
                .push((address.to_owned(), subject.to_owned(), body.to_owned()));
        }
    }
}
