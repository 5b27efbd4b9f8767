use std::sync::Arc;

use assetpack_lib::{Assets, Config, GetOptions};

use super::common::{TestEnv, inline, is_digest_name, urls};

fn minified(env: &TestEnv) -> Config {
  Config {
    minify: true,
    ..env.config()
  }
}

#[test]
fn combines_scss_sources_into_one_minified_css() {
  let env = TestEnv::new();
  env.write("sass/a.scss", "// header\nbody { color: red; }\n");
  env.write("sass/b.scss", "p { margin: 0; }\n");
  let pack = env.pack(minified(&env));

  pack.add("app.css", &["sass/a.scss", "sass/b.scss"]).unwrap();

  let urls = urls(&pack, "app.css");
  assert_eq!(urls.len(), 1);
  let name = urls[0].strip_prefix("/packed/").unwrap();
  assert!(is_digest_name(name, "app", "min.css"), "unexpected name {name}");
  assert_eq!(inline(&pack, "app.css"), "body{color:red}\np{margin:0}");
}

#[test]
fn changing_one_source_orphans_the_old_artifact() {
  let env = TestEnv::new();
  env.write("sass/a.scss", "body { color: red; }\n");
  env.write("sass/b.scss", "p { margin: 0; }\n");
  let pack = env.pack(minified(&env));

  pack.add("app.css", &["sass/a.scss", "sass/b.scss"]).unwrap();
  let before = urls(&pack, "app.css");

  env.write("sass/b.scss", "p { margin: 1px; }\n");
  pack.add("app.css", &["sass/a.scss", "sass/b.scss"]).unwrap();
  let after = urls(&pack, "app.css");

  assert_ne!(before, after);
  assert_eq!(env.packed_files().len(), 2, "old artifact stays until purged");
}

#[test]
fn identical_inputs_build_identical_artifacts() {
  let first = TestEnv::new();
  let second = TestEnv::new();
  for env in [&first, &second] {
    env.write("a.scss", "a { b: c; }\n");
    env.write("b.js", "var b = 1;\n");
  }

  let build = |env: &TestEnv| {
    let pack = env.pack(minified(env));
    pack.add("app.css", &["a.scss"]).unwrap();
    pack.add("app.js", &["b.js"]).unwrap();
    (urls(&pack, "app.css"), inline(&pack, "app.css"), urls(&pack, "app.js"))
  };

  assert_eq!(build(&first), build(&second));
}

#[test]
fn existing_artifact_skips_transforms() {
  let env = TestEnv::new();
  env.write("a.scss", "a { b: c; }\n");

  let first = env.pack(minified(&env));
  first.add("app.css", &["a.scss"]).unwrap();
  assert_eq!(env.sass.runs(), 1);
  let expected = urls(&first, "app.css");

  let restarted = env.pack(minified(&env));
  restarted.add("app.css", &["a.scss"]).unwrap();
  assert_eq!(env.sass.runs(), 1);
  assert_eq!(urls(&restarted, "app.css"), expected);
}

#[test]
fn source_order_changes_the_digest() {
  let env = TestEnv::new();
  env.write("a.js", "var a;\n");
  env.write("b.js", "var b;\n");
  let pack = env.pack(minified(&env));

  pack.add("ab.js", &["a.js", "b.js"]).unwrap();
  pack.add("ba.js", &["b.js", "a.js"]).unwrap();

  let ab = urls(&pack, "ab.js")[0].replace("/packed/ab-", "");
  let ba = urls(&pack, "ba.js")[0].replace("/packed/ba-", "");
  assert_ne!(ab, ba);
}

#[test]
fn multi_file_mode_serves_each_source() {
  let env = TestEnv::new();
  env.write("css/reset.css", "* { margin: 0; }\n");
  env.write("sass/theme.scss", "body { color: red; }\n");
  let pack = env.pack(env.config());

  pack.add("app.css", &["css/reset.css", "sass/theme.scss"]).unwrap();

  let urls = urls(&pack, "app.css");
  assert_eq!(urls.len(), 2);
  assert!(is_digest_name(urls[0].strip_prefix("/packed/").unwrap(), "reset", "css"));
  assert!(is_digest_name(urls[1].strip_prefix("/packed/").unwrap(), "theme", "css"));
  assert_eq!(inline(&pack, "app.css"), "* { margin: 0; }\nbody { color: red; }\n");
}

#[test]
fn no_cache_rebuilds_on_every_get() {
  let env = TestEnv::new();
  env.write("a.scss", "a { b: c; }\n");
  let pack = env.pack(Config {
    no_cache: true,
    ..minified(&env)
  });

  pack.add("app.css", &["a.scss"]).unwrap();
  urls(&pack, "app.css");
  urls(&pack, "app.css");
  assert_eq!(env.sass.runs(), 3);
}

#[test]
fn lazy_bundle_builds_once_under_concurrent_gets() {
  let env = TestEnv::new();
  env.write("a.scss", "a { b: c; }\n");
  let pack = Arc::new(env.pack(Config {
    lazy: true,
    ..minified(&env)
  }));
  pack.add("app.css", &["a.scss"]).unwrap();
  assert_eq!(env.sass.runs(), 0);

  let results: Vec<Vec<String>> = std::thread::scope(|scope| {
    let handles: Vec<_> = (0..8)
      .map(|_| {
        let pack = Arc::clone(&pack);
        scope.spawn(move || urls(&pack, "app.css"))
      })
      .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
  });

  assert_eq!(env.sass.runs(), 1);
  assert!(results.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn css_imports_are_inlined_and_tracked() {
  let env = TestEnv::new();
  env.write("css/app.css", "@import \"base.css\";\nh1 { font-weight: bold; }\n");
  env.write("css/base.css", "html { color: black; }\n");
  let pack = env.pack(minified(&env));

  pack.add("app.css", &["css/app.css"]).unwrap();
  assert_eq!(inline(&pack, "app.css"), "html{color:black}h1{font-weight:bold}");
  let before = urls(&pack, "app.css");

  env.write("css/base.css", "html { color: white; }\n");
  pack.add("app.css", &["css/app.css"]).unwrap();
  assert_ne!(urls(&pack, "app.css"), before);
}

#[test]
fn remote_sources_are_fetched_once() {
  let mut server = mockito::Server::new();
  let mock = server
    .mock("GET", "/vendor/lib.js")
    .with_status(200)
    .with_body("var lib = 1;\n")
    .expect(1)
    .create();

  let env = TestEnv::new();
  env.write("app.js", "lib();\n");
  let url = format!("{}/vendor/lib.js", server.url());

  let pack = env.pack(minified(&env));
  pack.add("app.js", &[url.as_str(), "app.js"]).unwrap();
  assert_eq!(inline(&pack, "app.js"), "var lib = 1;\nlib();\n");

  let restarted = env.pack(minified(&env));
  restarted.add("app.js", &[url.as_str(), "app.js"]).unwrap();
  mock.assert();

  let fetched = pack.fetch(&url).unwrap();
  assert!(fetched.starts_with(pack.out_dir()));
}

#[test]
fn artifacts_option_returns_handles() {
  let env = TestEnv::new();
  env.write("a.js", "var a;\n");
  let pack = env.pack(minified(&env));
  pack.add("app.js", &["a.js"]).unwrap();

  let options = GetOptions {
    assets: true,
    ..GetOptions::default()
  };
  let Assets::Artifacts(artifacts) = pack.get("app.js", options).unwrap() else {
    panic!("expected artifacts");
  };
  assert_eq!(artifacts.len(), 1);
  assert_eq!(artifacts[0].relative(), format!("packed/{}", artifacts[0].name));
  assert_eq!(artifacts[0].read().unwrap(), "var a;\n");
}
