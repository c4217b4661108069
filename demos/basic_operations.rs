use plain_kv::{
  batch::Operation,
  db::MemoryDb,
  option::{IteratorOptions, Options},
};

#[tokio::main]
async fn main() {
  env_logger::init();

  let db: MemoryDb<String, String> = MemoryDb::open(Options::default());
  db.on(|event| println!("event: {:?}", event));

  let put_res = db.put(&"name".to_string(), &"plain-kv".to_string()).await;
  assert!(put_res.is_ok());

  let res = db.get(&"name".to_string()).await;
  assert!(res.is_ok());
  let val = res.ok().unwrap();
  println!("val = {:?}", val);

  let users = db.sub(["users"]);
  users
    .put(&"alice".to_string(), &"admin".to_string())
    .await
    .expect("failed to put");

  let ops = vec![
    Operation::put("bob".to_string(), "reader".to_string()).at(["users"]),
    Operation::del("name".to_string()),
  ];
  db.execute(&ops).await.expect("failed to execute batch");

  for (key, value) in db.list_all().expect("failed to list") {
    println!("{key} = {value}");
  }

  let tail = db
    .keys(IteratorOptions {
      reverse: true,
      ..Default::default()
    })
    .expect("failed to list keys");
  println!("root keys, descending: {:?}", tail);
}
