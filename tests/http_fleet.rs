use benor_consensus::consensus::{NodeState, Value};
use benor_consensus::fleet::{Fleet, FleetSpec};
use futures::future::join_all;
use std::time::{Duration, Instant};

async fn get_state(client: &reqwest::Client, port: u16) -> NodeState {
    client
        .get(format!("http://127.0.0.1:{}/getState", port))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fleet_over_http_reaches_decision() {
    let base_port = 38_410;
    let fleet = Fleet::launch(FleetSpec::new(vec![Value::One; 4], 1).with_base_port(base_port))
        .await
        .unwrap();
    let client = reqwest::Client::new();

    let res = client
        .get(format!("http://127.0.0.1:{}/status", base_port + 3))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 500);
    assert_eq!(res.text().await.unwrap(), "faulty");

    // Drive the fleet exactly like an external orchestrator would.
    let starts = (0..4).map(|id| {
        client
            .get(format!("http://127.0.0.1:{}/start", base_port + id))
            .send()
    });
    for res in join_all(starts).await {
        assert_eq!(res.unwrap().status(), 200);
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut decided = false;
    while Instant::now() < deadline && !decided {
        let states = join_all((0..3).map(|id| get_state(&client, base_port + id))).await;
        decided = states.iter().all(|s| s.decided == Some(true));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(decided, "correct nodes did not decide over HTTP");

    for id in 0..3 {
        let state = get_state(&client, base_port + id).await;
        assert_eq!(state.x, Some(Value::One));
    }

    let res = client
        .get(format!("http://127.0.0.1:{}/stop", base_port))
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "Node stopped");
    assert!(get_state(&client, base_port).await.killed);

    drop(client);
    fleet.shutdown().await;
}
