/*!
# Quarry Daemon

## Help

```bash
quarry --help
```

## Example Usage

```bash
quarry --config=config --rpc-bind=127.0.0.1:2080
```

## Dev

To run from source:

```bash
cargo run -- --help
cargo run -- --rpc-bind=127.0.0.1:2080 --mining-threads=2
```
*/

use quarry::node;

#[tokio::main]
pub async fn main() -> quarry::Result<()> {
    tracing_subscriber::fmt::init();
    node::run().await
}
