use assetpack_lib::{AssetPackError, Config};
use serial_test::serial;

use super::common::{TestEnv, inline, is_digest_name, urls};

fn minified(env: &TestEnv) -> Config {
  Config {
    minify: true,
    ..env.config()
  }
}

#[test]
fn failing_script_becomes_error_artifact() {
  let env = TestEnv::new();
  env.write("app.scss", "@error \"it's broken\"\n");
  let pack = env.pack(minified(&env));

  pack.add("app.js", &["app.scss"]).unwrap();

  assert_eq!(urls(&pack, "app.js"), vec!["/packed/app-err.js".to_string()]);
  let content = inline(&pack, "app.js");
  assert!(content.starts_with("alert('AssetPack(app.js) failed: app.scss: "));
  assert!(content.contains("@error \\\"it\\'s broken\\\""));
  assert!(content.contains("console.log('AssetPack(app.js) failed:"));
  assert_eq!(content.lines().count(), 1);
}

#[test]
fn missing_stylesheet_shows_a_banner() {
  let env = TestEnv::new();
  let pack = env.pack(minified(&env));

  pack.add("app.css", &["nope.css"]).unwrap();

  let content = inline(&pack, "app.css");
  assert!(content.starts_with("html:before{"));
  assert!(content.contains("AssetPack(app.css) failed: nope.css: could not find source 'nope.css'"));
}

#[test]
fn broken_edit_keeps_serving_last_good_build() {
  let env = TestEnv::new();
  env.write("a.scss", "a { b: c; }\n");
  let pack = env.pack(minified(&env));

  pack.add("app.css", &["a.scss"]).unwrap();
  let good = urls(&pack, "app.css");

  env.write("a.scss", "@error oops\n");
  pack.add("app.css", &["a.scss"]).unwrap();

  assert_eq!(urls(&pack, "app.css"), good);
  assert!(!env.packed().join("app-err.css").exists());
}

#[test]
fn latest_artifact_on_disk_when_enabled() {
  let env = TestEnv::new();
  let stale = "0123456789abcdef0123456789abcdef";
  std::fs::write(env.packed().join(format!("app-{stale}.min.js")), "var stale;\n").unwrap();
  std::fs::write(env.packed().join(format!("app-{stale}.js")), "var other_mode;\n").unwrap();
  env.write("a.scss", "@error oops\n");

  let pack = env.pack(Config {
    fallback_to_latest: true,
    ..minified(&env)
  });
  pack.add("app.js", &["a.scss"]).unwrap();

  assert_eq!(urls(&pack, "app.js"), vec![format!("/packed/app-{stale}.min.js")]);
}

#[test]
fn production_mode_fails_hard() {
  let env = TestEnv::new();
  env.write("a.scss", "@error oops\n");
  let pack = env.pack(Config {
    mode: "production".to_string(),
    ..minified(&env)
  });

  match pack.add("app.css", &["a.scss"]) {
    Err(AssetPackError::Fatal(failure)) => {
      assert_eq!(failure.reference, "a.scss");
      assert_eq!(failure.topic, "app");
    }
    other => panic!("expected fatal error, got {other:?}"),
  }
}

#[test]
fn production_mode_can_opt_out_of_failing_hard() {
  let env = TestEnv::new();
  env.write("a.scss", "@error oops\n");
  let pack = env.pack(Config {
    mode: "production".to_string(),
    die_on_process_error: Some(false),
    ..minified(&env)
  });

  pack.add("app.css", &["a.scss"]).unwrap();
  assert_eq!(urls(&pack, "app.css"), vec!["/packed/app-err.css".to_string()]);
}

#[test]
#[serial]
fn env_toggle_makes_failures_fatal() {
  let env = TestEnv::new();
  env.write("a.scss", "@error oops\n");

  let config = temp_env::with_vars([("ASSETPACK_DIE_ON_PROCESS_ERROR", Some("1"))], || {
    minified(&env).with_env_overrides()
  });
  let pack = env.pack(config);

  assert!(matches!(pack.add("app.css", &["a.scss"]), Err(AssetPackError::Fatal(_))));
}

#[test]
fn multi_file_failure_only_affects_its_source() {
  let env = TestEnv::new();
  env.write("ok.scss", "a { b: c; }\n");
  env.write("bad.scss", "@error oops\n");
  let pack = env.pack(env.config());

  pack.add("app.css", &["ok.scss", "bad.scss"]).unwrap();

  let served = urls(&pack, "app.css");
  assert_eq!(served.len(), 2);
  assert!(is_digest_name(served[0].strip_prefix("/packed/").unwrap(), "ok", "css"));
  assert_eq!(served[1], "/packed/app-err.css");
  assert!(!env.packed().join("bad-err.css").exists());

  env.write("bad.scss", "p { q: r; }\n");
  pack.add("app.css", &["ok.scss", "bad.scss"]).unwrap();
  assert!(!env.packed().join("app-err.css").exists());
}

#[test]
fn failing_sources_of_one_bundle_share_its_error_artifact() {
  let env = TestEnv::new();
  env.write("a.scss", "@error one\n");
  env.write("b.scss", "@error two\n");
  let pack = env.pack(env.config());

  pack.add("app.css", &["a.scss", "b.scss"]).unwrap();

  assert_eq!(urls(&pack, "app.css"), vec!["/packed/app-err.css".to_string()]);
}

#[test]
fn bundles_sharing_a_source_stem_keep_their_own_error_artifact() {
  let env = TestEnv::new();
  env.write("x/theme.scss", "@error broken\n");
  env.write("y/theme.scss", "a { b: c; }\n");
  let pack = env.pack(env.config());

  pack.add("app.css", &["x/theme.scss"]).unwrap();
  assert_eq!(urls(&pack, "app.css"), vec!["/packed/app-err.css".to_string()]);

  pack.add("admin.css", &["y/theme.scss"]).unwrap();

  assert!(env.packed().join("app-err.css").exists());
  assert!(inline(&pack, "app.css").starts_with("html:before{"));
  let admin = urls(&pack, "admin.css");
  assert!(is_digest_name(admin[0].strip_prefix("/packed/").unwrap(), "theme", "css"));
}

#[test]
fn latest_on_disk_never_takes_another_bundles_artifact() {
  let env = TestEnv::new();
  env.write("y/theme.scss", "a { b: c; }\n");
  env.write("x/theme.scss", "@error broken\n");
  let pack = env.pack(Config {
    fallback_to_latest: true,
    ..env.config()
  });

  pack.add("admin.css", &["y/theme.scss"]).unwrap();
  pack.add("app.css", &["x/theme.scss"]).unwrap();

  assert_eq!(urls(&pack, "app.css"), vec!["/packed/app-err.css".to_string()]);
}

#[test]
fn same_stem_sources_fall_back_to_their_own_build() {
  let env = TestEnv::new();
  env.write("a/base.scss", "a { b: c; }\n");
  env.write("b/base.scss", "p { q: r; }\n");
  let pack = env.pack(env.config());

  pack.add("app.css", &["a/base.scss", "b/base.scss"]).unwrap();
  let good = urls(&pack, "app.css");
  assert_eq!(good.len(), 2);
  assert_ne!(good[0], good[1]);

  env.write("b/base.scss", "@error oops\n");
  pack.add("app.css", &["a/base.scss", "b/base.scss"]).unwrap();

  assert_eq!(urls(&pack, "app.css"), good);
}

#[test]
fn same_stem_sources_recover_from_saved_mapping_in_order() {
  let env = TestEnv::new();
  env.write("a/base.scss", "a { b: c; }\n");
  env.write("b/base.scss", "p { q: r; }\n");

  let first = env.pack(env.config());
  first.add("app.css", &["a/base.scss", "b/base.scss"]).unwrap();
  assert!(first.save_mapping());
  let good = urls(&first, "app.css");

  env.write("b/base.scss", "@error oops\n");
  let restarted = env.pack(env.config());
  assert_eq!(restarted.load_mapping(), 1);
  restarted.add("app.css", &["a/base.scss", "b/base.scss"]).unwrap();

  assert_eq!(urls(&restarted, "app.css"), good);
}

#[test]
fn fixed_source_replaces_error_artifact() {
  let env = TestEnv::new();
  env.write("a.scss", "@error oops\n");
  let pack = env.pack(minified(&env));

  pack.add("app.css", &["a.scss"]).unwrap();
  assert!(env.packed().join("app-err.css").exists());

  env.write("a.scss", "a { b: c; }\n");
  pack.add("app.css", &["a.scss"]).unwrap();

  assert!(!env.packed().join("app-err.css").exists());
  let urls = urls(&pack, "app.css");
  assert!(is_digest_name(urls[0].strip_prefix("/packed/").unwrap(), "app", "min.css"));
}

#[test]
fn saved_mapping_is_the_first_fallback_after_restart() {
  let env = TestEnv::new();
  env.write("a.scss", "a { b: c; }\n");

  let first = env.pack(minified(&env));
  first.add("app.css", &["a.scss"]).unwrap();
  assert!(first.save_mapping());
  let good = urls(&first, "app.css");

  env.write("a.scss", "@error oops\n");
  let restarted = env.pack(minified(&env));
  assert_eq!(restarted.load_mapping(), 1);
  restarted.add("app.css", &["a.scss"]).unwrap();

  assert_eq!(urls(&restarted, "app.css"), good);
}
