// src/batch/aggregate.rs
// =============================================================================
// This module puts results back in input order.
//
// Workers finish in whatever order the network lets them, so records arrive
// shuffled. The aggregator:
// 1. Drains the result channel until every worker has hung up
// 2. Drops each record into the slot for its position
// 3. Fills any slot that never got a record with a failure, so the output
//    always has one entry per submitted task
//
// Failed tasks show up as `None` in handle_maps(), keeping output[i] lined up
// with input[i].
// =============================================================================

use super::task::{ErrorKind, Outcome, ResultRecord};
use crate::extract::HandleMap;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, warn};

// Every task of a batch, ordered by position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub records: Vec<ResultRecord>,
}

impl BatchReport {
    // One entry per input URL; None where the task failed
    pub fn handle_maps(&self) -> Vec<Option<HandleMap>> {
        self.records
            .iter()
            .map(|record| record.outcome.handles().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn failed(&self) -> usize {
        self.records
            .iter()
            .filter(|record| !record.outcome.is_success())
            .count()
    }
}

// Receives records until all senders are gone
pub async fn collect_results(mut results: UnboundedReceiver<ResultRecord>) -> Vec<ResultRecord> {
    let mut records = Vec::new();
    while let Some(record) = results.recv().await {
        records.push(record);
    }
    records
}

// Orders records by position
//
// Parameters:
//   submitted: how many tasks the producer pushed
//   records: whatever the workers sent, in completion order
pub fn assemble(submitted: usize, records: Vec<ResultRecord>) -> BatchReport {
    let mut slots: Vec<Option<ResultRecord>> = vec![None; submitted];

    for record in records {
        let position = record.position;
        match slots.get_mut(position) {
            Some(slot) if slot.is_none() => *slot = Some(record),
            Some(_) => warn!(position, "Dropping duplicate result"),
            None => warn!(position, submitted, "Dropping result for unknown position"),
        }
    }

    let records = slots
        .into_iter()
        .enumerate()
        .map(|(position, slot)| {
            slot.unwrap_or_else(|| {
                error!(position, "Task finished without a result");
                ResultRecord {
                    position,
                    url: String::new(),
                    outcome: Outcome::failure(
                        ErrorKind::WorkerPanicked,
                        "task was queued but never processed",
                    ),
                }
            })
        })
        .collect();

    BatchReport { records }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Platform;

    fn success(position: usize, twitter: &str) -> ResultRecord {
        let mut handles = HandleMap::new();
        handles.insert(Platform::Twitter, twitter.to_string());
        ResultRecord {
            position,
            url: format!("https://site{}.com", position),
            outcome: Outcome::Success {
                handles,
                status: 200,
                redirects: Vec::new(),
            },
        }
    }

    fn failure(position: usize) -> ResultRecord {
        ResultRecord {
            position,
            url: "nodot".to_string(),
            outcome: Outcome::failure(ErrorKind::InvalidUrl, "no dot"),
        }
    }

    #[test]
    fn test_assemble_restores_order() {
        let report = assemble(3, vec![success(2, "c"), failure(1), success(0, "a")]);

        let positions: Vec<usize> = report.records.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);

        let maps = report.handle_maps();
        assert_eq!(maps.len(), 3);
        assert_eq!(maps[0].as_ref().unwrap()[&Platform::Twitter], "a");
        assert!(maps[1].is_none());
        assert_eq!(maps[2].as_ref().unwrap()[&Platform::Twitter], "c");
        assert_eq!(report.failed(), 1);
    }

    #[test]
    fn test_assemble_fills_missing_and_ignores_duplicates() {
        let report = assemble(3, vec![success(0, "first"), success(0, "second"), success(7, "x")]);

        assert_eq!(report.len(), 3);
        assert_eq!(report.handle_maps()[0].as_ref().unwrap()[&Platform::Twitter], "first");
        assert!(matches!(
            report.records[2].outcome,
            Outcome::Failure { kind: ErrorKind::WorkerPanicked, .. }
        ));
    }

    #[tokio::test]
    async fn test_collect_results_waits_for_all_senders() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let second = tx.clone();

        tx.send(failure(0)).unwrap();
        drop(tx);
        tokio::spawn(async move {
            second.send(failure(1)).unwrap();
        });

        assert_eq!(collect_results(rx).await.len(), 2);
    }

    #[test]
    fn test_empty_batch() {
        assert!(assemble(0, Vec::new()).is_empty());
        assert_eq!(assemble(0, Vec::new()).handle_maps(), Vec::<Option<HandleMap>>::new());
    }
}
