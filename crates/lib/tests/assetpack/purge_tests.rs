use assetpack_lib::{AssetPackError, Config, PurgeOptions};

use super::common::{TestEnv, urls};

fn minified(env: &TestEnv) -> Config {
  Config {
    minify: true,
    ..env.config()
  }
}

#[test]
fn purge_before_processing_is_an_error() {
  let env = TestEnv::new();
  let pack = env.pack(env.config());
  assert!(matches!(
    pack.purge(PurgeOptions::default()),
    Err(AssetPackError::PurgeBeforeProcess)
  ));
}

#[test]
fn removes_orphaned_builds() {
  let env = TestEnv::new();
  env.write("a.scss", "body { color: red; }\n");
  env.write("b.scss", "p { margin: 0; }\n");
  let pack = env.pack(minified(&env));

  pack.add("app.css", &["a.scss", "b.scss"]).unwrap();
  let old = urls(&pack, "app.css")[0].replace("/packed/", "");
  env.write("b.scss", "p { margin: 2px; }\n");
  pack.add("app.css", &["a.scss", "b.scss"]).unwrap();
  let current = urls(&pack, "app.css")[0].replace("/packed/", "");

  let report = pack.purge(PurgeOptions::default()).unwrap();

  assert_eq!(report.deleted.len(), 1);
  assert!(report.deleted[0].ends_with(&old));
  assert_eq!(report.bytes, "body{color:red}\np{margin:0}".len() as u64);
  assert_eq!(env.packed_files(), vec![current]);
}

#[test]
fn never_deletes_referenced_artifacts() {
  let env = TestEnv::new();
  env.write("a.scss", "a { b: c; }\n");
  let pack = env.pack(minified(&env));

  pack.add("app.css", &["a.scss"]).unwrap();
  let good = urls(&pack, "app.css")[0].replace("/packed/", "");

  env.write("a.scss", "@error oops\n");
  pack.add("app.css", &["a.scss"]).unwrap();

  let report = pack
    .purge(PurgeOptions {
      always: Some(true),
    })
    .unwrap();
  assert!(report.deleted.is_empty());
  assert!(env.packed().join(&good).exists());
}

#[test]
fn leaves_unrelated_files_alone() {
  let env = TestEnv::new();
  let foreign = "fedcba9876543210fedcba9876543210";
  std::fs::write(env.packed().join(format!("other-{foreign}.min.css")), "x").unwrap();
  std::fs::write(env.packed().join(format!("app-{foreign}.css")), "normal mode").unwrap();
  env.write("a.scss", "a { b: c; }\n");
  let pack = env.pack(minified(&env));

  pack.add("app.css", &["a.scss"]).unwrap();
  let report = pack.purge(PurgeOptions::default()).unwrap();

  assert!(report.deleted.is_empty());
  assert_eq!(env.packed_files().len(), 3);
}

#[test]
fn loaded_mapping_protects_unbuilt_bundles() {
  let env = TestEnv::new();
  env.write("a.scss", "a { b: c; }\n");
  env.write("lib.js", "var lib;\n");

  let first = env.pack(minified(&env));
  first.add("app.css", &["a.scss"]).unwrap();
  assert!(first.save_mapping());
  let saved = urls(&first, "app.css")[0].replace("/packed/", "");
  let orphan = "0123456789abcdef0123456789abcdef";
  std::fs::write(env.packed().join(format!("app-{orphan}.min.css")), "old").unwrap();

  let restarted = env.pack(Config {
    lazy: true,
    ..minified(&env)
  });
  restarted.load_mapping();
  restarted.add("app.css", &["a.scss"]).unwrap();
  restarted.add("lib.js", &["lib.js"]).unwrap();
  urls(&restarted, "lib.js");

  let report = restarted.purge(PurgeOptions::default()).unwrap();
  assert_eq!(report.deleted.len(), 1);
  assert!(report.deleted[0].ends_with(format!("app-{orphan}.min.css")));
  assert!(env.packed().join(&saved).exists());
}

#[test]
fn successful_rebuild_supersedes_loaded_mapping() {
  let env = TestEnv::new();
  env.write("a.scss", "a { b: c; }\n");

  let first = env.pack(minified(&env));
  first.add("app.css", &["a.scss"]).unwrap();
  first.save_mapping();
  let saved = urls(&first, "app.css")[0].replace("/packed/", "");

  env.write("a.scss", "a { b: d; }\n");
  let restarted = env.pack(minified(&env));
  restarted.load_mapping();
  restarted.add("app.css", &["a.scss"]).unwrap();

  let report = restarted.purge(PurgeOptions::default()).unwrap();
  assert_eq!(report.deleted.len(), 1);
  assert!(!env.packed().join(&saved).exists());
}

#[test]
fn production_purge_needs_always() {
  let env = TestEnv::new();
  env.write("a.js", "var a = 1;\n");
  let pack = env.pack(Config {
    mode: "production".to_string(),
    ..minified(&env)
  });
  pack.add("app.js", &["a.js"]).unwrap();
  env.write("a.js", "var a = 2;\n");
  pack.add("app.js", &["a.js"]).unwrap();

  assert!(pack.purge(PurgeOptions::default()).unwrap().deleted.is_empty());
  let report = pack
    .purge(PurgeOptions {
      always: Some(true),
    })
    .unwrap();
  assert_eq!(report.deleted.len(), 1);
}
