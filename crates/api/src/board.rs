//! Kanban boards for service orders and quotes.
//!
//! Column membership is derived from status alone. A drag is applied locally
//! first, then persisted with one status write; if that write fails the whole
//! board is put back the way it was before the drag.

use std::{collections::BTreeMap, fmt::Debug};

use async_graphql::Enum;
use async_trait::async_trait;
use chrono::Utc;
use entity::{quote, service_order};
use sea_orm::{
    prelude::DateTimeWithTimeZone, sea_query::Expr, ColumnTrait, ConnectionTrait, DbErr,
    EntityTrait, QueryFilter, QueryOrder,
};
use thiserror::Error;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::repo;

pub trait BoardStatus: Copy + Eq + Debug + Send + Sync + 'static {
    type Column: Copy + Ord + Debug + Send + Sync + 'static;

    /// Display order, catch-all column last.
    const COLUMNS: &'static [Self::Column];

    fn column(self) -> Self::Column;

    /// `None` for columns that do not correspond to a single status.
    fn for_column(column: Self::Column) -> Option<Self>;
}

pub trait BoardCard: Clone + Send + Sync {
    type Status: BoardStatus;

    fn card_id(&self) -> Uuid;
    fn status(&self) -> Self::Status;
    fn set_status(&mut self, status: Self::Status);
}

pub type ColumnOf<T> = <<T as BoardCard>::Status as BoardStatus>::Column;

/// Persists the status of a single card.
#[async_trait]
pub trait StatusWriter<S>: Send + Sync {
    async fn write_status(&self, card_id: Uuid, status: S) -> anyhow::Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot<C> {
    pub column: C,
    pub index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DragEnd<C> {
    pub card_id: Uuid,
    pub source: Slot<C>,
    /// `None` when the card was dropped outside every column.
    pub destination: Option<Slot<C>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragOutcome<S> {
    Ignored,
    /// `status` is the value written, or `None` for an unmapped column.
    Moved { status: Option<S> },
}

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("no card at index {index} of the source column")]
    SourceOutOfRange { index: usize },
    #[error("card {expected} is not at the dragged position")]
    StaleCard { expected: Uuid },
    #[error("status update rejected: {0}")]
    Rejected(anyhow::Error),
}

#[derive(Clone, Debug)]
pub struct Board<T: BoardCard> {
    columns: BTreeMap<ColumnOf<T>, Vec<T>>,
}

impl<T: BoardCard> Board<T> {
    /// Partition cards by status, keeping their relative order.
    pub fn partition(cards: impl IntoIterator<Item = T>) -> Self {
        let mut columns: BTreeMap<ColumnOf<T>, Vec<T>> = T::Status::COLUMNS
            .iter()
            .map(|column| (*column, Vec::new()))
            .collect();
        for card in cards {
            columns
                .entry(card.status().column())
                .or_default()
                .push(card);
        }
        Self { columns }
    }

    pub fn column(&self, column: ColumnOf<T>) -> &[T] {
        self.columns.get(&column).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn columns(&self) -> impl Iterator<Item = (ColumnOf<T>, &[T])> + '_ {
        self.columns
            .iter()
            .map(|(column, cards)| (*column, cards.as_slice()))
    }

    pub fn position_of(&self, card_id: Uuid) -> Option<Slot<ColumnOf<T>>> {
        self.columns.iter().find_map(|(column, cards)| {
            cards
                .iter()
                .position(|card| card.card_id() == card_id)
                .map(|index| Slot {
                    column: *column,
                    index,
                })
        })
    }

    pub fn card_ids(&self, column: ColumnOf<T>) -> Vec<Uuid> {
        self.column(column).iter().map(BoardCard::card_id).collect()
    }

    pub async fn handle_drag_end<W>(
        &mut self,
        drag: DragEnd<ColumnOf<T>>,
        writer: &W,
    ) -> Result<DragOutcome<T::Status>, BoardError>
    where
        W: StatusWriter<T::Status> + ?Sized,
    {
        let Some(destination) = drag.destination else {
            return Ok(DragOutcome::Ignored);
        };
        if destination == drag.source {
            return Ok(DragOutcome::Ignored);
        }

        let source_cards = self.column(drag.source.column);
        let Some(card) = source_cards.get(drag.source.index) else {
            return Err(BoardError::SourceOutOfRange {
                index: drag.source.index,
            });
        };
        if card.card_id() != drag.card_id {
            return Err(BoardError::StaleCard {
                expected: drag.card_id,
            });
        }

        let snapshot = self.columns.clone();
        let target_status = T::Status::for_column(destination.column);

        let mut card = match self.columns.get_mut(&drag.source.column) {
            Some(cards) => cards.remove(drag.source.index),
            None => {
                return Err(BoardError::SourceOutOfRange {
                    index: drag.source.index,
                });
            }
        };
        if let Some(status) = target_status {
            card.set_status(status);
        }
        let target = self.columns.entry(destination.column).or_default();
        let index = destination.index.min(target.len());
        target.insert(index, card);

        let Some(status) = target_status else {
            tracing::debug!(card_id = %drag.card_id, column = ?destination.column, "moved into unmapped column");
            return Ok(DragOutcome::Moved { status: None });
        };

        if let Err(err) = writer.write_status(drag.card_id, status).await {
            tracing::warn!(card_id = %drag.card_id, error = %err, "status write failed, restoring board");
            self.columns = snapshot;
            return Err(BoardError::Rejected(err));
        }
        Ok(DragOutcome::Moved {
            status: Some(status),
        })
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum OrderColumn {
    #[graphql(name = "SCHEDULED")]
    Scheduled,
    #[graphql(name = "IN_PROGRESS")]
    InProgress,
    #[graphql(name = "AWAITING_CUSTOMER")]
    AwaitingCustomer,
    #[graphql(name = "AWAITING_PARTS")]
    AwaitingParts,
    #[graphql(name = "HISTORY")]
    History,
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum QuoteColumn {
    #[graphql(name = "REQUESTED")]
    Requested,
    #[graphql(name = "UNDER_REVIEW")]
    UnderReview,
    #[graphql(name = "AWAITING_CUSTOMER")]
    AwaitingCustomer,
    #[graphql(name = "RETURNED_FOR_REVISION")]
    ReturnedForRevision,
    #[graphql(name = "HISTORY")]
    History,
}

impl BoardStatus for service_order::Status {
    type Column = OrderColumn;

    const COLUMNS: &'static [OrderColumn] = &[
        OrderColumn::Scheduled,
        OrderColumn::InProgress,
        OrderColumn::AwaitingCustomer,
        OrderColumn::AwaitingParts,
        OrderColumn::History,
    ];

    fn column(self) -> OrderColumn {
        use service_order::Status;
        match self {
            Status::Scheduled => OrderColumn::Scheduled,
            Status::InProgress => OrderColumn::InProgress,
            Status::AwaitingCustomer => OrderColumn::AwaitingCustomer,
            Status::AwaitingParts => OrderColumn::AwaitingParts,
            Status::Completed | Status::Cancelled => OrderColumn::History,
        }
    }

    fn for_column(column: OrderColumn) -> Option<Self> {
        use service_order::Status;
        match column {
            OrderColumn::Scheduled => Some(Status::Scheduled),
            OrderColumn::InProgress => Some(Status::InProgress),
            OrderColumn::AwaitingCustomer => Some(Status::AwaitingCustomer),
            OrderColumn::AwaitingParts => Some(Status::AwaitingParts),
            OrderColumn::History => None,
        }
    }
}

impl BoardStatus for quote::Status {
    type Column = QuoteColumn;

    const COLUMNS: &'static [QuoteColumn] = &[
        QuoteColumn::Requested,
        QuoteColumn::UnderReview,
        QuoteColumn::AwaitingCustomer,
        QuoteColumn::ReturnedForRevision,
        QuoteColumn::History,
    ];

    fn column(self) -> QuoteColumn {
        use quote::Status;
        match self {
            Status::Requested => QuoteColumn::Requested,
            Status::UnderReview => QuoteColumn::UnderReview,
            Status::AwaitingCustomer => QuoteColumn::AwaitingCustomer,
            Status::ReturnedForRevision => QuoteColumn::ReturnedForRevision,
            Status::Approved | Status::Cancelled => QuoteColumn::History,
        }
    }

    fn for_column(column: QuoteColumn) -> Option<Self> {
        use quote::Status;
        match column {
            QuoteColumn::Requested => Some(Status::Requested),
            QuoteColumn::UnderReview => Some(Status::UnderReview),
            QuoteColumn::AwaitingCustomer => Some(Status::AwaitingCustomer),
            QuoteColumn::ReturnedForRevision => Some(Status::ReturnedForRevision),
            QuoteColumn::History => None,
        }
    }
}

impl BoardCard for service_order::Model {
    type Status = service_order::Status;

    fn card_id(&self) -> Uuid {
        self.id
    }

    fn status(&self) -> Self::Status {
        self.status
    }

    fn set_status(&mut self, status: Self::Status) {
        self.status = status;
    }
}

impl BoardCard for quote::Model {
    type Status = quote::Status;

    fn card_id(&self) -> Uuid {
        self.id
    }

    fn status(&self) -> Self::Status {
        self.status
    }

    fn set_status(&mut self, status: Self::Status) {
        self.status = status;
    }
}

/// Writes statuses straight to the tenant's rows. Last write wins.
pub struct DbStatusWriter<'a, C> {
    conn: &'a C,
    business_id: Uuid,
}

impl<'a, C: ConnectionTrait> DbStatusWriter<'a, C> {
    pub fn new(conn: &'a C, business_id: Uuid) -> Self {
        Self { conn, business_id }
    }
}

#[async_trait]
impl<C> StatusWriter<service_order::Status> for DbStatusWriter<'_, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn write_status(&self, card_id: Uuid, status: service_order::Status) -> anyhow::Result<()> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let mut update = service_order::Entity::update_many()
            .col_expr(service_order::Column::Status, Expr::value(status))
            .col_expr(service_order::Column::UpdatedAt, Expr::value(now));
        if status == service_order::Status::InProgress {
            update = update.col_expr(
                service_order::Column::StartedAt,
                Expr::col(service_order::Column::StartedAt).if_null(now),
            );
        }
        let result = update
            .filter(service_order::Column::BusinessId.eq(self.business_id))
            .filter(service_order::Column::Id.eq(card_id))
            .exec(self.conn)
            .await?;
        if result.rows_affected == 0 {
            anyhow::bail!("service order {card_id} no longer exists");
        }
        Ok(())
    }
}

#[async_trait]
impl<C> StatusWriter<quote::Status> for DbStatusWriter<'_, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn write_status(&self, card_id: Uuid, status: quote::Status) -> anyhow::Result<()> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let result = quote::Entity::update_many()
            .col_expr(quote::Column::Status, Expr::value(status))
            .col_expr(quote::Column::UpdatedAt, Expr::value(now))
            .filter(quote::Column::BusinessId.eq(self.business_id))
            .filter(quote::Column::Id.eq(card_id))
            .exec(self.conn)
            .await?;
        if result.rows_affected == 0 {
            anyhow::bail!("quote {card_id} no longer exists");
        }
        Ok(())
    }
}

pub async fn load_service_order_board<C: ConnectionTrait>(
    conn: &C,
    business_id: Uuid,
) -> Result<Board<service_order::Model>, DbErr> {
    let span = info_span!("shop.board.load", board = "service_orders", %business_id);
    let orders = repo::list_query::<service_order::Entity>(business_id)
        .order_by_asc(service_order::Column::CreatedAt)
        .order_by_asc(service_order::Column::Id)
        .all(conn)
        .instrument(span)
        .await?;
    Ok(Board::partition(orders))
}

pub async fn load_quote_board<C: ConnectionTrait>(
    conn: &C,
    business_id: Uuid,
) -> Result<Board<quote::Model>, DbErr> {
    let span = info_span!("shop.board.load", board = "quotes", %business_id);
    let quotes = repo::list_query::<quote::Entity>(business_id)
        .order_by_asc(quote::Column::CreatedAt)
        .order_by_asc(quote::Column::Id)
        .all(conn)
        .instrument(span)
        .await?;
    Ok(Board::partition(quotes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Light {
        Red,
        Green,
        Off,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
    enum Lane {
        Red,
        Green,
        Archive,
    }

    impl BoardStatus for Light {
        type Column = Lane;
        const COLUMNS: &'static [Lane] = &[Lane::Red, Lane::Green, Lane::Archive];

        fn column(self) -> Lane {
            match self {
                Light::Red => Lane::Red,
                Light::Green => Lane::Green,
                Light::Off => Lane::Archive,
            }
        }

        fn for_column(column: Lane) -> Option<Self> {
            match column {
                Lane::Red => Some(Light::Red),
                Lane::Green => Some(Light::Green),
                Lane::Archive => None,
            }
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Card {
        id: Uuid,
        light: Light,
    }

    impl BoardCard for Card {
        type Status = Light;

        fn card_id(&self) -> Uuid {
            self.id
        }

        fn status(&self) -> Light {
            self.light
        }

        fn set_status(&mut self, status: Light) {
            self.light = status;
        }
    }

    #[derive(Default)]
    struct Recorder {
        fail: bool,
        writes: Mutex<Vec<(Uuid, Light)>>,
    }

    #[async_trait]
    impl StatusWriter<Light> for Recorder {
        async fn write_status(&self, card_id: Uuid, status: Light) -> anyhow::Result<()> {
            self.writes.lock().unwrap().push((card_id, status));
            if self.fail {
                anyhow::bail!("offline");
            }
            Ok(())
        }
    }

    fn card(light: Light) -> Card {
        Card {
            id: Uuid::new_v4(),
            light,
        }
    }

    fn drag(card: &Card, from: (Lane, usize), to: Option<(Lane, usize)>) -> DragEnd<Lane> {
        DragEnd {
            card_id: card.id,
            source: Slot {
                column: from.0,
                index: from.1,
            },
            destination: to.map(|(column, index)| Slot { column, index }),
        }
    }

    #[test]
    fn every_column_exists_even_when_empty() {
        let board: Board<Card> = Board::partition(Vec::new());
        let columns: Vec<Lane> = board.columns().map(|(column, _)| column).collect();
        assert_eq!(columns, vec![Lane::Red, Lane::Green, Lane::Archive]);
    }

    #[tokio::test]
    async fn dropping_outside_or_in_place_is_ignored() {
        let a = card(Light::Red);
        let mut board = Board::partition(vec![a.clone()]);
        let writer = Recorder::default();

        let outcome = board
            .handle_drag_end(drag(&a, (Lane::Red, 0), None), &writer)
            .await
            .unwrap();
        assert_eq!(outcome, DragOutcome::Ignored);
        let outcome = board
            .handle_drag_end(drag(&a, (Lane::Red, 0), Some((Lane::Red, 0))), &writer)
            .await
            .unwrap();
        assert_eq!(outcome, DragOutcome::Ignored);
        assert!(writer.writes.lock().unwrap().is_empty());
        assert_eq!(board.card_ids(Lane::Red), vec![a.id]);
    }

    #[tokio::test]
    async fn move_writes_destination_status() {
        let a = card(Light::Red);
        let b = card(Light::Green);
        let mut board = Board::partition(vec![a.clone(), b.clone()]);
        let writer = Recorder::default();

        let outcome = board
            .handle_drag_end(drag(&a, (Lane::Red, 0), Some((Lane::Green, 0))), &writer)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            DragOutcome::Moved {
                status: Some(Light::Green)
            }
        );
        assert_eq!(board.card_ids(Lane::Green), vec![a.id, b.id]);
        assert!(board.column(Lane::Red).is_empty());
        assert_eq!(board.column(Lane::Green)[0].light, Light::Green);
        assert_eq!(*writer.writes.lock().unwrap(), vec![(a.id, Light::Green)]);
    }

    #[tokio::test]
    async fn destination_index_is_clamped() {
        let a = card(Light::Red);
        let b = card(Light::Green);
        let mut board = Board::partition(vec![a.clone(), b.clone()]);
        board
            .handle_drag_end(
                drag(&a, (Lane::Red, 0), Some((Lane::Green, 99))),
                &Recorder::default(),
            )
            .await
            .unwrap();
        assert_eq!(board.card_ids(Lane::Green), vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn unmapped_column_moves_locally_only() {
        let a = card(Light::Red);
        let mut board = Board::partition(vec![a.clone()]);
        let writer = Recorder::default();
        let outcome = board
            .handle_drag_end(drag(&a, (Lane::Red, 0), Some((Lane::Archive, 0))), &writer)
            .await
            .unwrap();
        assert_eq!(outcome, DragOutcome::Moved { status: None });
        assert_eq!(board.card_ids(Lane::Archive), vec![a.id]);
        assert_eq!(board.column(Lane::Archive)[0].light, Light::Red);
        assert!(writer.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_write_restores_every_column() {
        let a = card(Light::Red);
        let b = card(Light::Red);
        let c = card(Light::Green);
        let mut board = Board::partition(vec![a.clone(), b.clone(), c.clone()]);
        let before: Vec<(Lane, Vec<Card>)> = board
            .columns()
            .map(|(lane, cards)| (lane, cards.to_vec()))
            .collect();
        let writer = Recorder {
            fail: true,
            ..Default::default()
        };

        let err = board
            .handle_drag_end(drag(&b, (Lane::Red, 1), Some((Lane::Green, 0))), &writer)
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::Rejected(_)));
        let after: Vec<(Lane, Vec<Card>)> = board
            .columns()
            .map(|(lane, cards)| (lane, cards.to_vec()))
            .collect();
        assert_eq!(before, after);
        assert_eq!(writer.writes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_source_leaves_board_untouched() {
        let a = card(Light::Red);
        let stranger = card(Light::Red);
        let mut board = Board::partition(vec![a.clone()]);
        let writer = Recorder::default();

        let err = board
            .handle_drag_end(drag(&a, (Lane::Red, 3), Some((Lane::Green, 0))), &writer)
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::SourceOutOfRange { index: 3 }));

        let err = board
            .handle_drag_end(
                drag(&stranger, (Lane::Red, 0), Some((Lane::Green, 0))),
                &writer,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::StaleCard { .. }));
        assert_eq!(board.card_ids(Lane::Red), vec![a.id]);
        assert!(writer.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reorder_within_a_column() {
        let a = card(Light::Red);
        let b = card(Light::Red);
        let c = card(Light::Red);
        let mut board = Board::partition(vec![a.clone(), b.clone(), c.clone()]);
        board
            .handle_drag_end(
                drag(&a, (Lane::Red, 0), Some((Lane::Red, 2))),
                &Recorder::default(),
            )
            .await
            .unwrap();
        assert_eq!(board.card_ids(Lane::Red), vec![b.id, c.id, a.id]);
        assert_eq!(board.position_of(a.id), Some(Slot { column: Lane::Red, index: 2 }));
    }

    #[test]
    fn terminal_statuses_share_the_history_column() {
        use service_order::Status;
        assert_eq!(Status::Completed.column(), OrderColumn::History);
        assert_eq!(Status::Cancelled.column(), OrderColumn::History);
        assert_eq!(
            <Status as BoardStatus>::for_column(OrderColumn::History),
            None
        );
        for column in <Status as BoardStatus>::COLUMNS {
            if let Some(status) = <Status as BoardStatus>::for_column(*column) {
                assert_eq!(status.column(), *column);
            }
        }
        for column in <quote::Status as BoardStatus>::COLUMNS {
            if let Some(status) = <quote::Status as BoardStatus>::for_column(*column) {
                assert_eq!(status.column(), *column);
            }
        }
        assert_eq!(quote::Status::Approved.column(), QuoteColumn::History);
    }
}
