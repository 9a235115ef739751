pub mod api;
pub mod events;
pub mod role;

pub use api::{
    ErrorBody, GetEventsQuery, GetEventsResponse, PropertyChange, PropertyChangeRequest,
    ReactivateStreamRequest, RealmCreateRequest, RealmInfo, RegisterRequest, RegisterResponse,
    StreamSpec, SubscribeRequest, SubscribeResponse, SubscribersResponse, SubscriptionsResponse,
    Success, UnsubscribeRequest, UnsubscribeResponse, UserCreateRequest, UserCreated,
};
pub use events::{
    Event, PersonInfo, QueuedEvent, RealmUserEvent, RemovedPerson, RemovedSubscription,
    StreamEvent, StreamInfo, SubscriptionEvent, SubscriptionInfo,
};
pub use role::UserRole;
