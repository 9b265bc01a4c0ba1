use std::sync::Arc;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Rejection};

use super::handlers;
use crate::consensus::ConsensusNode;

const MAX_MESSAGE_BYTES: u64 = 16 * 1024;

fn with_node(
    node: Arc<ConsensusNode>,
) -> impl Filter<Extract = (Arc<ConsensusNode>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || node.clone())
}

/// Vote body, or an empty one when it is missing, unsized or over the limit.
/// An empty body is then dropped as malformed, so `/message` still answers
/// 200 or 500 depending on `killed` alone.
fn vote_body() -> impl Filter<Extract = (Bytes,), Error = std::convert::Infallible> + Clone {
    warp::body::content_length_limit(MAX_MESSAGE_BYTES)
        .and(warp::body::bytes())
        .or(warp::any().map(Bytes::new))
        .unify()
}

/// Control surface and vote intake of one node.
pub fn routes(
    node: Arc<ConsensusNode>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let status = warp::path!("status")
        .and(warp::get())
        .and(with_node(node.clone()))
        .and_then(handlers::status);

    let get_state = warp::path!("getState")
        .and(warp::get())
        .and(with_node(node.clone()))
        .and_then(handlers::get_state);

    let start = warp::path!("start")
        .and(warp::get())
        .and(with_node(node.clone()))
        .and_then(handlers::start);

    let message = warp::path!("message")
        .and(warp::post())
        .and(vote_body())
        .and(with_node(node.clone()))
        .and_then(handlers::message);

    let stop = warp::path!("stop")
        .and(warp::get())
        .and(with_node(node.clone()))
        .and_then(handlers::stop);

    let metrics = warp::path!("metrics")
        .and(warp::get())
        .and(with_node(node))
        .and_then(handlers::metrics);

    status
        .or(get_state)
        .unify()
        .or(start)
        .unify()
        .or(message)
        .unify()
        .or(stop)
        .unify()
        .or(metrics)
        .unify()
}
