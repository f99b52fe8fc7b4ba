mod smoke_tests;

// This file organizes the integration tests into a cohesive test suite.
// Each module tests a specific aspect of the application:
// - smoke_tests: The application against an in-memory calendar provider
// - google_calendar_mock: The Google Calendar client against a mock HTTP server
// - state_store: Persistence backends selected through the configuration
