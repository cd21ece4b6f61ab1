use imgscope::{
    api::{AnalysisApi, HttpApi},
    config::Config,
    controller::Controller,
    dispatch::Outcome,
    report::{ReportHandlers, RunStatus},
    scheduler::ManualScheduler,
    submit::Upload,
};
use mockito::Matcher;

fn cfg_for(server: &mockito::Server) -> Config {
    let mut cfg = Config::default();
    cfg.server.base_url = server.url();
    cfg.server.request_timeout_seconds = 5;
    cfg
}

fn upload() -> Upload {
    Upload::new("cat.png", "image/png", b"not-really-a-png".to_vec(), Some(" what animal? "))
}

#[test]
fn submit_sends_multipart_with_csrf_header() {
    let mut server = mockito::Server::new();
    let m = server
        .mock("POST", "/blog/process-image/")
        .match_header("x-csrftoken", "tok123")
        .match_header(
            "content-type",
            Matcher::Regex("^multipart/form-data; boundary=".into()),
        )
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"name="image"; filename="cat.png""#.into()),
            Matcher::Regex(r#"name="query_text""#.into()),
            Matcher::Regex("what animal\\?".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"job_id":"abc","status":"processing"}"#)
        .create();

    let mut cfg = cfg_for(&server);
    cfg.server.csrf_token = Some("tok123".into());
    let api = HttpApi::new(&cfg).unwrap();
    let reply = api.submit(&upload()).unwrap();

    m.assert();
    assert_eq!(reply.status, 200);
    assert!(reply.body.contains("abc"));
}

#[test]
fn query_field_omitted_when_blank() {
    let mut server = mockito::Server::new();
    let with_query = server
        .mock("POST", "/blog/process-image/")
        .match_body(Matcher::Regex("query_text".into()))
        .with_status(200)
        .with_body("{}")
        .expect(0)
        .create();
    let without = server
        .mock("POST", "/blog/process-image/")
        .with_status(200)
        .with_body(r#"{"short_caption":"x"}"#)
        .create();

    let api = HttpApi::new(&cfg_for(&server)).unwrap();
    let u = Upload::new("a.png", "image/png", b"png".to_vec(), Some("   "));
    api.submit(&u).unwrap();

    with_query.assert();
    without.assert();
}

#[test]
fn status_url_escapes_job_id() {
    let server = mockito::Server::new();
    let api = HttpApi::new(&cfg_for(&server)).unwrap();
    let url = api.status_url("a b/c").unwrap();
    assert!(url.as_str().ends_with("/blog/check-job/a%20b%2Fc/"));
}

#[test]
fn status_reply_keeps_http_status() {
    let mut server = mockito::Server::new();
    let m = server
        .mock("GET", "/blog/check-job/gone/")
        .with_status(404)
        .with_body(r#"{"status":"failed","error":"Job not found"}"#)
        .create();

    let api = HttpApi::new(&cfg_for(&server)).unwrap();
    let reply = api.job_status("gone").unwrap();

    m.assert();
    assert_eq!(reply.status, 404);
}

#[test]
fn connection_failure_is_an_error() {
    let mut cfg = Config::default();
    cfg.server.base_url = "http://127.0.0.1:9".into();
    cfg.server.request_timeout_seconds = 2;
    let api = HttpApi::new(&cfg).unwrap();
    assert!(api.job_status("x").is_err());
}

#[test]
fn end_to_end_submit_and_poll() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/blog/process-image/")
        .with_status(200)
        .with_body(r#"{"job_id":"e2e","status":"processing"}"#)
        .create();
    let status = server
        .mock("GET", "/blog/check-job/e2e/")
        .with_status(200)
        .with_body(r#"{"status":"completed","short_caption":"a cat","image_url":"/x.jpg"}"#)
        .expect(1)
        .create();

    let cfg = cfg_for(&server);
    let api = HttpApi::new(&cfg).unwrap();
    let mut c = Controller::new(&cfg, api, ManualScheduler::new(), ReportHandlers::default());

    assert_eq!(c.submit(&upload()).as_deref(), Some("e2e"));
    c.run_until_idle();

    status.assert();
    let h = c.handlers();
    assert_eq!(h.status(), RunStatus::Completed);
    assert_eq!(h.accepted.as_ref().map(|j| j.id.as_str()), Some("e2e"));
    match &h.outcome {
        Some(Outcome::Success(r)) => assert_eq!(r.image_url.as_deref(), Some("/x.jpg")),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn forbidden_submit_reports_login_url() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/blog/process-image/")
        .with_status(403)
        .create();

    let cfg = cfg_for(&server);
    let api = HttpApi::new(&cfg).unwrap();
    let mut c = Controller::new(&cfg, api, ManualScheduler::new(), ReportHandlers::default());
    c.submit(&upload());

    let h = c.handlers();
    assert_eq!(h.status(), RunStatus::AuthRequired);
    assert_eq!(h.login_url, Some(format!("{}/blog/login/?next=/blog/", server.url())));
}

#[test]
fn recent_analyses_returns_fragment() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/blog/recent-analyses/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<ul class=\"recent\"></ul>")
        .create();

    let api = HttpApi::new(&cfg_for(&server)).unwrap();
    let reply = api.recent_analyses().unwrap();
    assert!(reply.is_success());
    assert!(reply.body.contains("recent"));
}
