use async_graphql::{Context, InputObject, Object, SimpleObject, ID};
use entity::{quote, service_order};
use platform_api::ApiError;
use tracing::{info_span, Instrument};

use super::{
    database, gql,
    nodes::{QuoteNode, QuoteStatus, ServiceOrderNode, ServiceOrderStatus},
    parse_uuid, require,
};
use crate::{
    board::{
        load_quote_board, load_service_order_board, Board, BoardError, DbStatusWriter, DragEnd,
        DragOutcome, OrderColumn, QuoteColumn, Slot,
    },
    db_err,
    identity::Permission,
};

#[derive(Clone, Debug, SimpleObject)]
pub struct OrderBoardColumn {
    pub column: OrderColumn,
    pub cards: Vec<ServiceOrderNode>,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct OrderBoard {
    pub columns: Vec<OrderBoardColumn>,
}

impl From<&Board<service_order::Model>> for OrderBoard {
    fn from(board: &Board<service_order::Model>) -> Self {
        Self {
            columns: board
                .columns()
                .map(|(column, cards)| OrderBoardColumn {
                    column,
                    cards: cards.iter().cloned().map(ServiceOrderNode::from).collect(),
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct QuoteBoardColumn {
    pub column: QuoteColumn,
    pub cards: Vec<QuoteNode>,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct QuoteBoard {
    pub columns: Vec<QuoteBoardColumn>,
}

impl From<&Board<quote::Model>> for QuoteBoard {
    fn from(board: &Board<quote::Model>) -> Self {
        Self {
            columns: board
                .columns()
                .map(|(column, cards)| QuoteBoardColumn {
                    column,
                    cards: cards.iter().cloned().map(QuoteNode::from).collect(),
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, InputObject)]
pub struct OrderDragInput {
    pub card_id: ID,
    pub source_column: OrderColumn,
    pub source_index: i32,
    /// Omitted when the card was dropped outside the board.
    pub destination_column: Option<OrderColumn>,
    #[graphql(default)]
    pub destination_index: i32,
}

#[derive(Clone, Debug, InputObject)]
pub struct QuoteDragInput {
    pub card_id: ID,
    pub source_column: QuoteColumn,
    pub source_index: i32,
    pub destination_column: Option<QuoteColumn>,
    #[graphql(default)]
    pub destination_index: i32,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct OrderDragResult {
    /// False when the drop was a no-op.
    pub moved: bool,
    /// Status persisted by the move; empty for the history column.
    pub written_status: Option<ServiceOrderStatus>,
    pub board: OrderBoard,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct QuoteDragResult {
    pub moved: bool,
    pub written_status: Option<QuoteStatus>,
    pub board: QuoteBoard,
}

fn index(field: &str, value: i32) -> async_graphql::Result<usize> {
    usize::try_from(value)
        .map_err(|_| gql(ApiError::validation(format!("{field} cannot be negative"))))
}

fn drag_end<C: Copy>(
    card_id: &ID,
    source_column: C,
    source_index: i32,
    destination_column: Option<C>,
    destination_index: i32,
) -> async_graphql::Result<DragEnd<C>> {
    let destination = match destination_column {
        Some(column) => Some(Slot {
            column,
            index: index("destinationIndex", destination_index)?,
        }),
        None => None,
    };
    Ok(DragEnd {
        card_id: parse_uuid(card_id)?,
        source: Slot {
            column: source_column,
            index: index("sourceIndex", source_index)?,
        },
        destination,
    })
}

fn board_error(err: BoardError) -> async_graphql::Error {
    match err {
        BoardError::Rejected(source) => gql(ApiError::BoardRollback(source.to_string())),
        other => gql(ApiError::validation(format!("invalid drag: {other}"))),
    }
}

#[derive(Default)]
pub struct BoardQuery;

#[Object]
impl BoardQuery {
    async fn service_order_board(&self, ctx: &Context<'_>) -> async_graphql::Result<OrderBoard> {
        let principal = require(ctx, Permission::Orders)?;
        let db = database(ctx)?;
        let board = load_service_order_board(db.as_ref(), principal.business_id)
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(OrderBoard::from(&board))
    }

    async fn quote_board(&self, ctx: &Context<'_>) -> async_graphql::Result<QuoteBoard> {
        let principal = require(ctx, Permission::Quotes)?;
        let db = database(ctx)?;
        let board = load_quote_board(db.as_ref(), principal.business_id)
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(QuoteBoard::from(&board))
    }
}

#[derive(Default)]
pub struct BoardMutation;

#[Object]
impl BoardMutation {
    async fn drag_service_order(
        &self,
        ctx: &Context<'_>,
        input: OrderDragInput,
    ) -> async_graphql::Result<OrderDragResult> {
        let principal = require(ctx, Permission::Orders)?;
        let db = database(ctx)?;
        let drag = drag_end(
            &input.card_id,
            input.source_column,
            input.source_index,
            input.destination_column,
            input.destination_index,
        )?;
        let span = info_span!(
            "shop.board.drag",
            board = "service_orders",
            card_id = %drag.card_id,
            from = ?drag.source.column,
            to = ?drag.destination.map(|slot| slot.column),
        );
        async move {
            let mut board = load_service_order_board(db.as_ref(), principal.business_id)
                .await
                .map_err(|err| gql(db_err(err)))?;
            let writer = DbStatusWriter::new(db.as_ref(), principal.business_id);
            let outcome = board
                .handle_drag_end(drag, &writer)
                .await
                .map_err(board_error)?;
            let (moved, written_status) = match outcome {
                DragOutcome::Ignored => (false, None),
                DragOutcome::Moved { status } => (true, status.map(ServiceOrderStatus::from)),
            };
            Ok::<_, async_graphql::Error>(OrderDragResult {
                moved,
                written_status,
                board: OrderBoard::from(&board),
            })
        }
        .instrument(span)
        .await
    }

    async fn drag_quote(
        &self,
        ctx: &Context<'_>,
        input: QuoteDragInput,
    ) -> async_graphql::Result<QuoteDragResult> {
        let principal = require(ctx, Permission::Quotes)?;
        let db = database(ctx)?;
        let drag = drag_end(
            &input.card_id,
            input.source_column,
            input.source_index,
            input.destination_column,
            input.destination_index,
        )?;
        let span = info_span!(
            "shop.board.drag",
            board = "quotes",
            card_id = %drag.card_id,
            from = ?drag.source.column,
            to = ?drag.destination.map(|slot| slot.column),
        );
        async move {
            let mut board = load_quote_board(db.as_ref(), principal.business_id)
                .await
                .map_err(|err| gql(db_err(err)))?;
            let writer = DbStatusWriter::new(db.as_ref(), principal.business_id);
            let outcome = board
                .handle_drag_end(drag, &writer)
                .await
                .map_err(board_error)?;
            let (moved, written_status) = match outcome {
                DragOutcome::Ignored => (false, None),
                DragOutcome::Moved { status } => (true, status.map(QuoteStatus::from)),
            };
            Ok::<_, async_graphql::Error>(QuoteDragResult {
                moved,
                written_status,
                board: QuoteBoard::from(&board),
            })
        }
        .instrument(span)
        .await
    }
}
