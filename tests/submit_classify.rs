use imgscope::{
    api::Reply,
    config::Config,
    error::FailureReason,
    job::JobStatus,
    submit::{Submission, Upload, classify_submit, mime_for_extension},
};
use std::io::Write;

const LOGIN: &str = "http://host/blog/login/?next=/blog/";

#[test]
fn accepted_reply_creates_processing_job() {
    let reply = Reply::new(
        200,
        r#"{"job_id":"7f3c","status":"processing","message":"Image uploaded and processing started"}"#,
    );
    match classify_submit(&reply, LOGIN) {
        Submission::Accepted(job) => {
            assert_eq!(job.id, "7f3c");
            assert_eq!(job.status, JobStatus::Processing);
            assert!(job.result.is_none());
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn direct_result_without_status_is_immediate() {
    let reply = Reply::new(200, r#"{"short_caption":"a tree","image_url":"/m/t.jpg"}"#);
    match classify_submit(&reply, LOGIN) {
        Submission::Immediate(r) => assert_eq!(r.short_caption.as_deref(), Some("a tree")),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn auth_statuses_require_login() {
    for status in [401, 403] {
        assert_eq!(
            classify_submit(&Reply::new(status, ""), LOGIN),
            Submission::AuthRequired { login_url: LOGIN.into() }
        );
    }
}

#[test]
fn failures_are_classified() {
    assert_eq!(
        classify_submit(&Reply::new(500, r#"{"error":"Error processing image"}"#), LOGIN),
        Submission::Failed(FailureReason::http_status(500))
    );
    assert_eq!(
        classify_submit(&Reply::new(200, r#"{"error":"No image file provided"}"#), LOGIN),
        Submission::Failed(FailureReason::DomainFailure("No image file provided".into()))
    );
    assert_eq!(
        classify_submit(
            &Reply::new(200, r#"{"error":"Error processing image","details":"cannot identify image file"}"#),
            LOGIN
        ),
        Submission::Failed(FailureReason::DomainFailure(
            "Error processing image: cannot identify image file".into()
        ))
    );
    assert!(matches!(
        classify_submit(&Reply::new(200, r#"{"status":"processing"}"#), LOGIN),
        Submission::Failed(FailureReason::Malformed(_))
    ));
    assert!(matches!(
        classify_submit(&Reply::new(200, "not json"), LOGIN),
        Submission::Failed(FailureReason::Malformed(_))
    ));
    assert!(matches!(
        classify_submit(&Reply::new(200, "{}"), LOGIN),
        Submission::Failed(FailureReason::Malformed(_))
    ));
}

#[test]
fn query_text_is_trimmed_and_dropped_when_blank() {
    let u = Upload::new("a.png", "image/png", vec![1], Some("  what breed?  "));
    assert_eq!(u.query_text.as_deref(), Some("what breed?"));
    let u = Upload::new("a.png", "image/png", vec![1], Some("   "));
    assert_eq!(u.query_text, None);
}

#[test]
fn upload_from_path_validates_image() {
    let cfg = Config::default();
    let dir = tempfile::tempdir().unwrap();

    let img = dir.path().join("Photo.JPG");
    std::fs::File::create(&img).unwrap().write_all(&[0xff, 0xd8, 0xff, 0xe0]).unwrap();
    let u = Upload::from_path(&cfg, &img, None).unwrap();
    assert_eq!(u.mime, "image/jpeg");
    assert_eq!(u.file_name, "Photo.JPG");
    assert_eq!(u.bytes.len(), 4);
    assert_eq!(u.sha256().len(), 64);

    let txt = dir.path().join("notes.txt");
    std::fs::write(&txt, b"hello").unwrap();
    assert!(Upload::from_path(&cfg, &txt, None).is_err());

    let empty = dir.path().join("empty.png");
    std::fs::write(&empty, b"").unwrap();
    assert!(Upload::from_path(&cfg, &empty, None).is_err());

    let mut small = Config::default();
    small.upload.max_file_bytes = 2;
    assert!(Upload::from_path(&small, &img, None).is_err());
}

#[test]
fn mime_lookup() {
    assert_eq!(mime_for_extension("PNG"), Some("image/png"));
    assert_eq!(mime_for_extension("webp"), Some("image/webp"));
    assert_eq!(mime_for_extension("pdf"), None);
}
