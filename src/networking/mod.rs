/*!

# RPC Interface

## Introduction

Quarry exposes a minimal JSON-over-HTTP RPC interface for node-to-node
and operator interaction. Every call either returns a typed success
payload or a typed error body; callers are expected to branch on the
error kind.

## Routes

```text
GET  /info/version                  -> {"version"}
GET  /info/uptime                   -> {"uptime_ms"}
GET  /mining/info                   -> mining status record
POST /peering/connect               -> peer record        body: {"address"}
GET  /peering/list                  -> array of peer records
GET  /peering/poll/<address>        -> peer record
POST /transactions/broadcast        -> {"hash"}           body: {"timestamp","binary","aux_data"?}
```

`binary` and `aux_data` are hex-encoded. Any other path returns the
`unknown-method` error.

## Errors

Failed calls carry a JSON body with a stable kind and a human-readable
detail:

```json
{"error": "dial-error", "message": "dial failed: ..."}
```

Kinds and their HTTP statuses:

```text
invalid-address        400
self-connection        400
transport-error        400
already-connected      409
unknown-peer           404
unknown-method         404
payload-too-large      413
queue-full             503
dial-error             502
internal-error         500
```

*/

pub mod filters;
pub mod handlers;
pub mod network;
pub mod signals;
