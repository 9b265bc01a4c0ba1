use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::{self, Response};
use warp::Reply;

use super::types::{FAULTY, LIVE, MESSAGE_RECEIVED, NODE_STOPPED, STARTED};
use crate::consensus::ConsensusNode;

fn text(body: &'static str, status: StatusCode) -> Response {
    reply::with_status(body, status).into_response()
}

pub async fn status(node: Arc<ConsensusNode>) -> Result<Response, Infallible> {
    Ok(if node.is_faulty() {
        text(FAULTY, StatusCode::INTERNAL_SERVER_ERROR)
    } else {
        text(LIVE, StatusCode::OK)
    })
}

pub async fn get_state(node: Arc<ConsensusNode>) -> Result<Response, Infallible> {
    let state = node.state().await;
    Ok(reply::json(&state).into_response())
}

pub async fn start(node: Arc<ConsensusNode>) -> Result<Response, Infallible> {
    Ok(match node.start().await {
        Ok(()) => text(STARTED, StatusCode::OK),
        Err(e) => {
            tracing::debug!(node = node.id(), "start refused: {}", e);
            text(NODE_STOPPED, StatusCode::INTERNAL_SERVER_ERROR)
        }
    })
}

pub async fn message(body: Bytes, node: Arc<ConsensusNode>) -> Result<Response, Infallible> {
    Ok(match node.receive_raw(&body).await {
        Ok(_) => text(MESSAGE_RECEIVED, StatusCode::OK),
        Err(_) => text(NODE_STOPPED, StatusCode::INTERNAL_SERVER_ERROR),
    })
}

pub async fn stop(node: Arc<ConsensusNode>) -> Result<Response, Infallible> {
    node.stop().await;
    Ok(text(NODE_STOPPED, StatusCode::OK))
}

pub async fn metrics(node: Arc<ConsensusNode>) -> Result<Response, Infallible> {
    Ok(match node.metrics().render() {
        Ok(body) => reply::with_status(body, StatusCode::OK).into_response(),
        Err(e) => {
            tracing::error!(node = node.id(), "❌ metrics encoding failed: {}", e);
            text("metrics unavailable", StatusCode::INTERNAL_SERVER_ERROR)
        }
    })
}
