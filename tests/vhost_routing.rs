//! End-to-end host routing through the HTTP server.

use std::time::Duration;

use vhostd::config::ServerConfig;

mod common;

use common::{route, start_server, temp_dir, write_site};

fn config_with_default(default_root: &std::path::Path) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.vhost.app = Some(default_root.to_path_buf());
    config.vhost.watch = false;
    config
}

#[tokio::test]
async fn test_literal_wildcard_and_default() {
    let base = temp_dir("routing");
    let default_site = write_site(&base, "default", r#"echo("default");"#);
    let www = write_site(&base, "www", r#"echo("www " + host());"#);
    let wild = write_site(&base, "wild", r#"echo("wild " + host());"#);

    let server = start_server(
        config_with_default(&default_site),
        vec![route("*.example.com", &wild), route("www.example.com", &www)],
    )
    .await;
    let client = common::client();

    let body = |host: &'static str| {
        let client = client.clone();
        let url = server.url("/");
        async move {
            client
                .get(url)
                .header("host", host)
                .send()
                .await
                .expect("server unreachable")
                .text()
                .await
                .unwrap()
        }
    };

    assert_eq!(body("www.example.com").await, "www www.example.com");
    assert_eq!(body("WWW.Example.com:8080").await, "www WWW.Example.com");
    assert_eq!(body("api.example.com").await, "wild api.example.com");
    assert_eq!(body("example.org").await, "default");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_status_headers_and_request_id() {
    let base = temp_dir("headers");
    let site = write_site(
        &base,
        "site",
        r#"status(418); header("x-site", "teapot"); echo("short and stout");"#,
    );

    let server = start_server(config_with_default(&site), vec![]).await;
    let res = common::client().get(server.url("/any/path")).send().await.unwrap();

    assert_eq!(res.status(), 418);
    assert_eq!(res.headers()["x-site"], "teapot");
    assert!(res.headers().contains_key("x-request-id"));
    assert!(res.headers()["server"].to_str().unwrap().starts_with("vhostd/"));
    assert_eq!(res.text().await.unwrap(), "short and stout");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_missing_and_failing_scripts() {
    let base = temp_dir("errors");
    let empty = base.join("empty");
    std::fs::create_dir_all(&empty).unwrap();
    let broken = write_site(&base, "broken", "let = 1;");

    let server = start_server(
        config_with_default(&empty),
        vec![route("broken.test", &broken)],
    )
    .await;
    let client = common::client();

    let res = client.get(server.url("/")).header("host", "nothing.test").send().await.unwrap();
    assert_eq!(res.status(), 404);

    let res = client.get(server.url("/")).header("host", "broken.test").send().await.unwrap();
    assert_eq!(res.status(), 500);

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_sleeping_script_resumes() {
    let base = temp_dir("sleep");
    let site = write_site(&base, "site", r#"echo("a"); sleep(50); echo("b");"#);

    let server = start_server(config_with_default(&site), vec![]).await;

    let start = std::time::Instant::now();
    let res = common::client().get(server.url("/")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "ab");
    assert!(start.elapsed() >= Duration::from_millis(50));

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_process_timeout_closes_connection() {
    let base = temp_dir("timeout");
    let site = write_site(&base, "site", r#"sleep(20); check_timeout(); echo("late");"#);

    let mut config = config_with_default(&site);
    config.timeouts.process_secs = 0;
    let server = start_server(config, vec![]).await;

    let res = common::client().get(server.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 500);
    assert_eq!(res.headers()["connection"], "close");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_route_update_takes_effect() {
    let base = temp_dir("update");
    let default_site = write_site(&base, "default", r#"echo("default");"#);
    let fresh = write_site(&base, "fresh", r#"echo("fresh");"#);

    let server = start_server(config_with_default(&default_site), vec![]).await;
    let client = common::client();

    let res = client.get(server.url("/")).header("host", "new.test").send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "default");

    server.route_updates.send(vec![route("new.test", &fresh)]).unwrap();
    let mut resolved = false;
    for _ in 0..50 {
        if server.directory.resolve_owned(Some("new.test")) == fresh {
            resolved = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(resolved, "route update was not applied");

    let res = client.get(server.url("/")).header("host", "new.test").send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "fresh");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_sleepers_beyond_script_budget_get_503() {
    let base = temp_dir("budget");
    let default_site = write_site(&base, "default", r#"sleep(500); echo("slept");"#);

    let mut config = config_with_default(&default_site);
    config.script.max_concurrent = 2;
    let server = start_server(config, vec![]).await;
    let client = common::client();

    let mut requests = Vec::new();
    for _ in 0..3 {
        let client = client.clone();
        let url = server.url("/");
        requests.push(tokio::spawn(async move {
            client.get(url).send().await.expect("server unreachable").status().as_u16()
        }));
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let mut statuses = Vec::new();
    for request in requests {
        statuses.push(request.await.unwrap());
    }
    statuses.sort_unstable();
    assert_eq!(statuses, vec![200, 200, 503]);

    // Slots come back once the sleepers finish.
    let status = client.get(server.url("/")).send().await.unwrap().status();
    assert_eq!(status.as_u16(), 200);

    server.shutdown.trigger();
}
