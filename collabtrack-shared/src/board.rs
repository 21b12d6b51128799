/// Kanban board logic
///
/// Pure functions behind the board endpoints:
///
/// - partitioning a project's tasks into the three status columns
/// - the search filter over title, description and assignee emails
/// - placing a dragged card with a fractional rank
///
/// The database side lives in `models::task`; nothing here does I/O.
///
/// # Ranks
///
/// Cards in a column are ordered by `rank` ascending, then `created_at`. New
/// cards go to the end (`max + RANK_STEP`). A drop between two cards takes the
/// midpoint of their ranks; a drop at either end steps `RANK_STEP` past the
/// outermost card. When two neighbours are too close to bisect the whole column
/// is renumbered.
///
/// # Example
///
/// ```
/// use collabtrack_shared::board::{plan_move, MovePlan, RankedCard};
/// use uuid::Uuid;
///
/// let (a, b, moved) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
/// let column = vec![
///     RankedCard { id: a, rank: 1024.0 },
///     RankedCard { id: b, rank: 2048.0 },
/// ];
///
/// // Dropped between a and b from another column
/// assert_eq!(plan_move(&column, moved, false, 1), MovePlan::Place { rank: 1536.0 });
/// ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::task::{Task, TaskStatus};
use crate::models::user::UserProfile;

/// Rank distance between consecutive cards after an append or a renumber
pub const RANK_STEP: f64 = 1024.0;

/// Neighbour ranks closer than this are renumbered instead of bisected
pub const MIN_RANK_GAP: f64 = 1e-6;

/// Completed drag-and-drop gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragEvent {
    /// Column the card was picked up from
    pub source: TaskStatus,

    /// Column the card was dropped into
    pub destination: TaskStatus,

    /// Position in the destination column, counted without the dragged card
    pub index: usize,
}

impl DragEvent {
    pub fn crosses_columns(&self) -> bool {
        self.source != self.destination
    }
}

/// Card id and rank, as read from a column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedCard {
    pub id: Uuid,
    pub rank: f64,
}

/// What a move has to write
#[derive(Debug, Clone, PartialEq)]
pub enum MovePlan {
    /// Same column, same position
    Unchanged,

    /// Give the moved card this rank
    Place { rank: f64 },

    /// Rewrite every rank in the column (the moved card included)
    Renumber { ranks: Vec<(Uuid, f64)> },
}

impl MovePlan {
    /// New rank of the moved card, if it gets one
    pub fn rank_of(&self, card: Uuid) -> Option<f64> {
        match self {
            MovePlan::Unchanged => None,
            MovePlan::Place { rank } => Some(*rank),
            MovePlan::Renumber { ranks } => ranks
                .iter()
                .find(|(id, _)| *id == card)
                .map(|(_, rank)| *rank),
        }
    }
}

/// Rank strictly between `prev` and `next`, or None if the gap is exhausted
pub fn rank_between(prev: Option<f64>, next: Option<f64>) -> Option<f64> {
    match (prev, next) {
        (None, None) => Some(RANK_STEP),
        (Some(prev), None) => Some(prev + RANK_STEP),
        (None, Some(next)) => Some(next - RANK_STEP),
        (Some(prev), Some(next)) => {
            if next - prev < MIN_RANK_GAP {
                return None;
            }
            let mid = prev + (next - prev) / 2.0;
            (mid > prev && mid < next).then_some(mid)
        }
    }
}

/// Plans the drop of `card` at `index` in `column`
///
/// `column` is the destination column in display order. It contains the card
/// itself when the move stays within one column. `index` is clamped to the
/// column length.
pub fn plan_move(column: &[RankedCard], card: Uuid, same_column: bool, index: usize) -> MovePlan {
    let current = column.iter().position(|c| c.id == card);
    let others: Vec<RankedCard> = column.iter().filter(|c| c.id != card).copied().collect();
    let index = index.min(others.len());

    if same_column && current == Some(index) {
        return MovePlan::Unchanged;
    }

    let prev = index.checked_sub(1).map(|i| others[i].rank);
    let next = others.get(index).map(|c| c.rank);

    match rank_between(prev, next) {
        Some(rank) => MovePlan::Place { rank },
        None => {
            let mut ids: Vec<Uuid> = others.iter().map(|c| c.id).collect();
            ids.insert(index, card);
            MovePlan::Renumber {
                ranks: ids
                    .into_iter()
                    .enumerate()
                    .map(|(i, id)| (id, (i as f64 + 1.0) * RANK_STEP))
                    .collect(),
            }
        }
    }
}

/// Case-insensitive substring match over title, description and assignee emails
///
/// A blank query matches everything.
pub fn matches_search<'a, I>(task: &Task, assignee_emails: I, query: &str) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }

    task.title.to_lowercase().contains(&query)
        || task.description.to_lowercase().contains(&query)
        || assignee_emails
            .into_iter()
            .any(|email| email.to_lowercase().contains(&query))
}

/// Task with its assignees resolved to profiles
#[derive(Debug, Clone, Serialize)]
pub struct BoardCard {
    #[serde(flatten)]
    pub task: Task,

    pub assignee_profiles: Vec<UserProfile>,
}

/// Tasks of one project, one column per status
#[derive(Debug, Clone, Default, Serialize)]
pub struct Board {
    pub todo: Vec<BoardCard>,

    #[serde(rename = "in-progress")]
    pub in_progress: Vec<BoardCard>,

    pub done: Vec<BoardCard>,
}

impl Board {
    /// Partitions `tasks` by status, keeping only cards that match `query`
    ///
    /// `users` resolves assignee ids; unknown ids are dropped from the profiles
    /// but stay in the task's `assignees`. Column order follows `rank`, then
    /// `created_at`.
    pub fn build(tasks: Vec<Task>, users: &HashMap<Uuid, UserProfile>, query: &str) -> Self {
        let mut board = Board::default();

        for task in tasks {
            let assignee_profiles: Vec<UserProfile> = task
                .assignees
                .iter()
                .filter_map(|id| users.get(id).cloned())
                .collect();

            let emails = assignee_profiles.iter().map(|p| p.email.as_str());
            if !matches_search(&task, emails, query) {
                continue;
            }

            board.column_mut(task.status).push(BoardCard {
                task,
                assignee_profiles,
            });
        }

        for status in TaskStatus::ALL {
            board.column_mut(status).sort_by(|a, b| {
                a.task
                    .rank
                    .total_cmp(&b.task.rank)
                    .then(a.task.created_at.cmp(&b.task.created_at))
            });
        }

        board
    }

    pub fn column(&self, status: TaskStatus) -> &[BoardCard] {
        match status {
            TaskStatus::Todo => &self.todo,
            TaskStatus::InProgress => &self.in_progress,
            TaskStatus::Done => &self.done,
        }
    }

    fn column_mut(&mut self, status: TaskStatus) -> &mut Vec<BoardCard> {
        match status {
            TaskStatus::Todo => &mut self.todo,
            TaskStatus::InProgress => &mut self.in_progress,
            TaskStatus::Done => &mut self.done,
        }
    }

    /// Total number of cards across all columns
    pub fn len(&self) -> usize {
        self.todo.len() + self.in_progress.len() + self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
